/// The SMTP-level sender and recipients of the current transaction, as
/// distinct from the message's own `From`/`To` headers.
///
/// Addresses are kept as the raw strings received on the wire. The
/// recipient list preserves order and duplicates.
#[derive(Default, Debug)]
pub struct Envelope {
    sender: Option<String>,
    recipients: Vec<String>,
}

impl Envelope {
    #[inline]
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    #[inline]
    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = Some(sender.into());
    }

    #[inline]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    #[inline]
    pub fn push_recipient(&mut self, recipient: impl Into<String>) {
        self.recipients.push(recipient.into());
    }

    #[inline]
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    /// Clears the envelope so the next transaction on the connection starts
    /// empty.
    pub fn clear(&mut self) {
        self.sender = None;
        self.recipients.clear();
    }
}

/// Whether `sender` belongs to one of the configured `allowed` domains.
///
/// An empty allow-list accepts everything. Matching is case-insensitive and
/// accepts either an exact `@domain` suffix or a `.domain>` suffix, the
/// latter tolerating a trailing angle bracket in header-style addresses.
pub fn sender_allowed(sender: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let sender = sender.to_ascii_lowercase();

    allowed.iter().any(|domain| {
        let domain = domain.to_ascii_lowercase();
        sender.ends_with(&format!("@{domain}")) || sender.ends_with(&format!(".{domain}>"))
    })
}
