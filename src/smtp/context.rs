use crate::smtp::{envelope::Envelope, status::Status};

/// Per-connection context shared between the session loop and the
/// transaction handler.
///
/// The handler communicates rejections and custom replies back to the
/// session by setting `response`; the session consumes it when formatting
/// the next reply. `data` holds the raw message of the in-flight DATA
/// command and never outlives it.
#[derive(Default, Debug)]
pub struct ValidationContext {
    /// Hostname the client identified as in HELO/EHLO.
    pub id: String,
    /// Whether the client greeted with EHLO.
    pub extended: bool,
    pub envelope: Envelope,
    pub data: Option<Vec<u8>>,
    pub response: Option<(Status, String)>,
}

impl ValidationContext {
    /// Drops all per-transaction state, keeping the connection greeting.
    pub fn reset_transaction(&mut self) {
        self.envelope.clear();
        self.data = None;
    }
}

#[cfg(test)]
mod test {
    use super::ValidationContext;

    #[test]
    fn reset_clears_transaction_but_not_greeting() {
        let mut ctx = ValidationContext {
            id: "client.example.com".to_string(),
            extended: true,
            ..Default::default()
        };
        ctx.envelope.set_sender("a@b.com");
        ctx.envelope.push_recipient("c@d.com");
        ctx.data = Some(b"Subject: Hi\r\n\r\nhello".to_vec());

        ctx.reset_transaction();

        assert!(ctx.envelope.sender().is_none());
        assert_eq!(ctx.envelope.recipient_count(), 0);
        assert!(ctx.data.is_none());
        assert_eq!(ctx.id, "client.example.com");
        assert!(ctx.extended);
    }
}
