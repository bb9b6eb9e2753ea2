use async_trait::async_trait;

use crate::smtp::context::ValidationContext;

/// Per-transaction callbacks invoked by the session as the SMTP state
/// machine advances.
///
/// This separates what the relay *does* with a transaction (allow-list
/// checks, decoding, delivery) from the protocol plumbing (state
/// transitions, I/O). One concrete implementation is enough; the session is
/// generic so tests can substitute their own.
///
/// A callback rejects its phase by returning `false`, optionally setting a
/// custom reply through [`ValidationContext::response`]; otherwise the
/// session sends the default reply for the new state.
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    /// MAIL FROM received. Accepting stores the sender in the envelope.
    async fn on_mail(&mut self, ctx: &mut ValidationContext, from: &str) -> bool;

    /// RCPT TO received, once per recipient.
    async fn on_rcpt(&mut self, ctx: &mut ValidationContext, to: &str) -> bool;

    /// The complete message arrived. Runs the decode/translate/deliver path
    /// synchronously; `ctx.data` holds the raw bytes.
    async fn on_data(&mut self, ctx: &mut ValidationContext) -> bool;

    /// AUTH received. The relay performs no authentication; implementations
    /// are expected to accept and move on.
    fn on_auth_plain(&mut self, ctx: &mut ValidationContext, mechanism: &str);

    /// RSET received, or a transaction finished. Clears envelope state.
    fn on_reset(&mut self, ctx: &mut ValidationContext);

    /// The connection is going away.
    fn on_logout(&mut self, ctx: &mut ValidationContext);
}
