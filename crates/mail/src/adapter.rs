//! Mailbox adapter trait
//!
//! Isolates the service from the mail provider's API shape. Request
//! handlers depend on this trait rather than on [`crate::GmailClient`]
//! directly, so tests can substitute fakes.

use anyhow::Result;

use crate::models::UnreadMessage;

/// Trait for looking up the most recent unread message in a mailbox
pub trait UnreadMailbox: Send + Sync {
    /// Fetch the most recent unread message for `address`.
    ///
    /// Returns `Ok(None)` when the mailbox has no unread messages.
    /// Provider and network failures propagate as-is; there is no
    /// retry and no partial result.
    fn fetch_latest_unread(&self, address: &str) -> Result<Option<UnreadMessage>>;
}
