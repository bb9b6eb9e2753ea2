//! Error types for the message relay path.

use thiserror::Error;

use crate::provider::DeliveryError;

/// Failures while extracting text/html candidates from a multipart body.
///
/// These are recoverable: the translator logs a warning and falls back to
/// relaying the raw body as plain text.
#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("not a multipart message")]
    NotMultipart,

    #[error("no boundary found")]
    MissingBoundary,

    #[error("no text or html content found")]
    NoContent,

    #[error("failed to parse message: {0}")]
    Parse(#[from] mailparse::MailParseError),
}

/// A transaction-fatal relay failure: the DATA command is rejected and the
/// message is dropped, never queued or retried.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The message is not a parseable RFC 5322 message.
    #[error("failed to parse message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    /// The provider call failed, or the provider rejected the message.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delivery_errors_keep_status_and_body() {
        let err = RelayError::from(DeliveryError::Rejected {
            status: 500,
            body: "rate limited".to_string(),
        });

        assert_eq!(err.to_string(), "provider returned status 500: rate limited");
    }

    #[test]
    fn multipart_error_display() {
        assert_eq!(
            MultipartError::MissingBoundary.to_string(),
            "no boundary found"
        );
        assert_eq!(
            MultipartError::NoContent.to_string(),
            "no text or html content found"
        );
    }
}
