//! The outbound delivery transport: one HTTP call per accepted message.

pub mod http;

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpDeliveryClient;

/// A parsed mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl EmailAddress {
    #[must_use]
    pub fn new(name: Option<String>, address: impl Into<String>) -> Self {
        Self {
            name,
            address: address.into(),
        }
    }
}

/// One content block of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub mime_type: String,
    pub body: String,
}

impl Content {
    #[must_use]
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            mime_type: "text/plain".to_string(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            mime_type: "text/html".to_string(),
            body: body.into(),
        }
    }
}

/// Provider-agnostic send request, handed to the transport once and
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub content: Vec<Content>,
}

/// What the provider answered, verbatim. Interpretation of the status code
/// is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

/// Errors from the delivery transport or the provider itself.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The HTTP request never completed (connection, TLS, serialization).
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The provider answered with an error status.
    #[error("provider returned status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Narrow interface to the provider's transactional send endpoint.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Submit one send request.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Transport`] when no response was obtained at
    /// all; provider-level rejections come back as a [`ProviderResponse`]
    /// with an error status.
    async fn send(&self, request: &SendRequest) -> Result<ProviderResponse, DeliveryError>;
}

enum TestReply {
    Respond(u16, String),
    FailTransport(String),
}

/// In-process [`DeliveryClient`] for tests: records every request and
/// answers with a canned response.
pub struct TestDeliveryClient {
    requests: Mutex<Vec<SendRequest>>,
    reply: TestReply,
}

impl Default for TestDeliveryClient {
    fn default() -> Self {
        Self::respond_with(202, "")
    }
}

impl TestDeliveryClient {
    #[must_use]
    pub fn respond_with(status: u16, body: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: TestReply::Respond(status, body.to_string()),
        }
    }

    #[must_use]
    pub fn fail_with(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: TestReply::FailTransport(message.to_string()),
        }
    }

    /// Every request submitted so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<SendRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }
}

#[async_trait]
impl DeliveryClient for TestDeliveryClient {
    async fn send(&self, request: &SendRequest) -> Result<ProviderResponse, DeliveryError> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());

        match &self.reply {
            TestReply::Respond(status, body) => Ok(ProviderResponse {
                status: *status,
                body: body.clone(),
            }),
            TestReply::FailTransport(message) => Err(DeliveryError::Transport(message.clone())),
        }
    }
}
