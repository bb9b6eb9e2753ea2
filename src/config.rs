//! Relay configuration, sourced from the environment once at startup.

use std::net::SocketAddr;

use crate::error::ConfigError;

/// Maximum accepted message size, enforced while reading DATA.
pub const MAX_MESSAGE_SIZE: usize = 25 * 1024 * 1024;

/// Maximum number of recipients accepted per transaction.
pub const MAX_RECIPIENTS: usize = 50;

/// Seconds a session may sit idle between commands before it is dropped.
pub const COMMAND_TIMEOUT_SECS: u64 = 30;

/// Default provider endpoint for the transactional send API.
pub const DEFAULT_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Process-wide relay configuration.
///
/// Constructed once from the environment and shared read-only between
/// sessions; there is no reload.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Provider API key used to authenticate outbound sends.
    pub api_key: String,
    /// Provider transactional send endpoint.
    pub endpoint: String,
    /// Address the SMTP listener binds to.
    pub listen_addr: SocketAddr,
    /// Domain advertised in the SMTP greeting.
    pub domain: String,
    /// Log verbosity, one of debug/info/warn/error.
    pub log_level: String,
    /// Sender domains permitted to relay. Empty means all senders are allowed.
    pub allowed_senders: Vec<String>,
}

impl RelayConfig {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the API key is missing or the listen
    /// address cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("SENDGRID_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingVar("SENDGRID_API_KEY"))?;

        let listen_addr = parse_listen_addr(
            lookup("SMTP_LISTEN_ADDR")
                .filter(|addr| !addr.is_empty())
                .unwrap_or_else(|| ":25".to_string())
                .as_str(),
        )?;

        Ok(Self {
            api_key,
            endpoint: lookup("SENDGRID_API_URL")
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            listen_addr,
            domain: lookup("SMTP_DOMAIN")
                .filter(|domain| !domain.is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            log_level: lookup("LOG_LEVEL")
                .filter(|level| !level.is_empty())
                .unwrap_or_else(|| "info".to_string()),
            allowed_senders: lookup("ALLOWED_SENDERS")
                .map(|senders| parse_allowed_senders(&senders))
                .unwrap_or_default(),
        })
    }
}

/// Parse a listen address, accepting the `:PORT` shorthand for all interfaces.
fn parse_listen_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{raw}")
    } else {
        raw.to_string()
    };

    candidate
        .parse()
        .map_err(|err: std::net::AddrParseError| ConfigError::Invalid {
            field: "SMTP_LISTEN_ADDR",
            reason: err.to_string(),
        })
}

fn parse_allowed_senders(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|sender| !sender.is_empty())
        .map(str::to_string)
        .collect()
}
