//! Process and session level error types.

use std::io;

use thiserror::Error;

/// Errors raised while loading the relay configuration from the environment.
///
/// Any of these is fatal: the process refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    /// A configuration value is present but unusable.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors that can occur while handling one SMTP session.
///
/// These terminate the affected connection only, never the process.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connection error occurred.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// Protocol error occurred during the session.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The client went silent for longer than the command timeout.
    #[error("session timed out after {0} seconds")]
    Timeout(u64),
}

impl SessionError {
    /// Returns `true` if the error is a client-side issue.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Timeout(_))
    }
}
