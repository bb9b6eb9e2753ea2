//! The relay itself: session callbacks that turn an accepted SMTP
//! transaction into one provider API call.

pub mod decoder;
pub mod error;
pub mod translator;

use std::{net::SocketAddr, sync::Arc, time::Instant};

use async_trait::async_trait;

use crate::{
    config::{self, RelayConfig},
    provider::DeliveryClient,
    relay::error::RelayError,
    smtp::{
        context::ValidationContext, envelope, handler::TransactionHandler, status::Status,
    },
};

/// How much of the subject makes it into the post-delivery log record.
const LOGGED_SUBJECT_CHARS: usize = 50;

/// The one concrete [`TransactionHandler`]: checks the sender allow-list,
/// collects the envelope, and relays each completed message synchronously
/// within its transaction.
pub struct RelayHandler {
    config: Arc<RelayConfig>,
    client: Arc<dyn DeliveryClient>,
    peer: SocketAddr,
}

impl RelayHandler {
    pub fn new(
        config: Arc<RelayConfig>,
        client: Arc<dyn DeliveryClient>,
        peer: SocketAddr,
    ) -> Self {
        Self {
            config,
            client,
            peer,
        }
    }

    /// Decode, translate and deliver one message. Returns the decoded
    /// subject for the caller's log record.
    async fn relay(&self, raw: &[u8], ctx: &ValidationContext) -> Result<String, RelayError> {
        tracing::debug!("Received email data: {} bytes", raw.len());

        let decoded = decoder::decode(raw)?;
        let request = translator::build_request(&decoded, raw, ctx.envelope.recipients());

        let response = self.client.send(&request).await?;
        translator::interpret(&response)?;

        Ok(decoded.subject)
    }
}

#[async_trait]
impl TransactionHandler for RelayHandler {
    async fn on_mail(&mut self, ctx: &mut ValidationContext, from: &str) -> bool {
        if !envelope::sender_allowed(from, &self.config.allowed_senders) {
            tracing::warn!("Rejected sender {from} (not in allowed list)");
            ctx.response = Some((Status::Error, "sender domain not allowed".to_string()));
            return false;
        }

        ctx.envelope.set_sender(from);
        tracing::debug!("MAIL FROM: {from}");
        true
    }

    async fn on_rcpt(&mut self, ctx: &mut ValidationContext, to: &str) -> bool {
        if ctx.envelope.recipient_count() >= config::MAX_RECIPIENTS {
            tracing::warn!("Rejected recipient {to} (too many recipients)");
            ctx.response = Some((
                Status::InsufficientStorage,
                "too many recipients".to_string(),
            ));
            return false;
        }

        ctx.envelope.push_recipient(to);
        tracing::debug!("RCPT TO: {to}");
        true
    }

    async fn on_data(&mut self, ctx: &mut ValidationContext) -> bool {
        let started = Instant::now();

        let Some(data) = ctx.data.take() else {
            ctx.response = Some((Status::TransactionFailed, "no message data".to_string()));
            return false;
        };

        match self.relay(&data, ctx).await {
            Ok(subject) => {
                tracing::info!(
                    "Email sent successfully: from={} to={:?} subject={:?} duration={:?}",
                    ctx.envelope.sender().unwrap_or_default(),
                    ctx.envelope.recipients(),
                    truncate(&subject, LOGGED_SUBJECT_CHARS),
                    started.elapsed()
                );
                ctx.response = Some((Status::Ok, "Ok: message relayed".to_string()));
                true
            }
            Err(err) => {
                tracing::error!("Failed to relay message: {err}");
                ctx.response = Some((Status::TransactionFailed, err.to_string()));
                false
            }
        }
    }

    fn on_auth_plain(&mut self, ctx: &mut ValidationContext, _mechanism: &str) {
        // No authentication required for an internal relay
        tracing::debug!("Auth attempt from {} (ignored - internal relay)", self.peer);
        ctx.response = Some((
            Status::AuthenticationSucceeded,
            "2.7.0 Authentication successful".to_string(),
        ));
    }

    fn on_reset(&mut self, ctx: &mut ValidationContext) {
        ctx.reset_transaction();
        tracing::debug!("Session reset");
    }

    fn on_logout(&mut self, _ctx: &mut ValidationContext) {
        tracing::debug!("Session logout from {}", self.peer);
    }
}

/// First `max` characters of `s`, with an ellipsis suffix when truncated.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::{truncate, RelayHandler};
    use crate::{
        config::RelayConfig,
        provider::TestDeliveryClient,
        smtp::{context::ValidationContext, handler::TransactionHandler, status::Status},
    };

    fn handler(
        allowed_senders: &[&str],
        client: Arc<TestDeliveryClient>,
    ) -> RelayHandler {
        let config = RelayConfig {
            api_key: "SG.test".to_string(),
            endpoint: "https://provider.invalid/v3/mail/send".to_string(),
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            domain: "testing".to_string(),
            log_level: "info".to_string(),
            allowed_senders: allowed_senders.iter().map(ToString::to_string).collect(),
        };

        RelayHandler::new(Arc::new(config), client, "127.0.0.1:1234".parse().unwrap())
    }

    #[test]
    fn truncate_subjects_for_logging() {
        assert_eq!(truncate("short", 50), "short");
        assert_eq!(truncate(&"s".repeat(50), 50), "s".repeat(50));
        assert_eq!(
            truncate(&"s".repeat(51), 50),
            format!("{}...", "s".repeat(50))
        );
    }

    #[tokio::test]
    async fn allowed_sender_enters_the_envelope() {
        let mut ctx = ValidationContext::default();
        let mut handler = handler(&["trusted.com"], Arc::new(TestDeliveryClient::default()));

        assert!(handler.on_mail(&mut ctx, "user@trusted.com").await);
        assert_eq!(ctx.envelope.sender(), Some("user@trusted.com"));
        assert!(ctx.response.is_none());
    }

    #[tokio::test]
    async fn rejected_sender_is_discarded() {
        let mut ctx = ValidationContext::default();
        let mut handler = handler(&["trusted.com"], Arc::new(TestDeliveryClient::default()));

        assert!(!handler.on_mail(&mut ctx, "x@evil.com").await);
        assert!(ctx.envelope.sender().is_none());
        assert_eq!(
            ctx.response,
            Some((Status::Error, "sender domain not allowed".to_string()))
        );
    }

    #[tokio::test]
    async fn recipients_are_capped() {
        let mut ctx = ValidationContext::default();
        let mut handler = handler(&[], Arc::new(TestDeliveryClient::default()));

        for n in 0..crate::config::MAX_RECIPIENTS {
            assert!(handler.on_rcpt(&mut ctx, &format!("r{n}@d.com")).await);
        }

        assert!(!handler.on_rcpt(&mut ctx, "overflow@d.com").await);
        assert_eq!(
            ctx.envelope.recipient_count(),
            crate::config::MAX_RECIPIENTS
        );
    }

    #[tokio::test]
    async fn data_is_relayed_through_the_client() {
        let client = Arc::new(TestDeliveryClient::respond_with(202, ""));
        let mut ctx = ValidationContext::default();
        ctx.envelope.set_sender("a@b.com");
        ctx.envelope.push_recipient("c@d.com");
        ctx.data =
            Some(b"Subject: Hi\r\nFrom: a@b.com\r\nContent-Type: text/plain\r\n\r\nhello".to_vec());

        let mut handler = handler(&[], Arc::clone(&client));
        assert!(handler.on_data(&mut ctx).await);
        assert_eq!(
            ctx.response,
            Some((Status::Ok, "Ok: message relayed".to_string()))
        );

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].from.address, "a@b.com");
        assert_eq!(requests[0].to[0].address, "c@d.com");
        assert_eq!(requests[0].subject, "Hi");
        assert_eq!(requests[0].content[0].body, "hello");
    }

    #[tokio::test]
    async fn provider_rejection_fails_the_transaction() {
        let client = Arc::new(TestDeliveryClient::respond_with(500, "rate limited"));
        let mut ctx = ValidationContext::default();
        ctx.envelope.set_sender("a@b.com");
        ctx.envelope.push_recipient("c@d.com");
        ctx.data = Some(b"Subject: Hi\r\n\r\nhello".to_vec());

        let mut handler = handler(&[], Arc::clone(&client));
        assert!(!handler.on_data(&mut ctx).await);

        let (status, message) = ctx.response.unwrap();
        assert_eq!(status, Status::TransactionFailed);
        assert!(message.contains("500"));
        assert!(message.contains("rate limited"));

        // Exactly one attempt, no retry
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_fails_the_transaction() {
        let client = Arc::new(TestDeliveryClient::fail_with("connection refused"));
        let mut ctx = ValidationContext::default();
        ctx.envelope.push_recipient("c@d.com");
        ctx.data = Some(b"Subject: Hi\r\n\r\nhello".to_vec());

        let mut handler = handler(&[], Arc::clone(&client));
        assert!(!handler.on_data(&mut ctx).await);

        let (status, message) = ctx.response.unwrap();
        assert_eq!(status, Status::TransactionFailed);
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn data_without_a_message_fails_without_a_send() {
        let client = Arc::new(TestDeliveryClient::default());
        let mut ctx = ValidationContext::default();
        ctx.envelope.push_recipient("c@d.com");

        let mut handler = handler(&[], Arc::clone(&client));
        assert!(!handler.on_data(&mut ctx).await);

        let (status, _) = ctx.response.unwrap();
        assert_eq!(status, Status::TransactionFailed);
        assert!(client.requests().is_empty());
    }
}
