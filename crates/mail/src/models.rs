//! Domain models for messages read from the provider

/// The most recent unread message of a mailbox.
///
/// Transient: built from one provider fetch, consumed by one request,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadMessage {
    /// Short preview text supplied by the provider
    pub snippet: String,
    /// Decoded plain-text body, if the message had a usable text part
    pub body: Option<String>,
}

impl UnreadMessage {
    /// Create a message with a snippet and a decoded body
    pub fn new(snippet: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            snippet: snippet.into(),
            body: Some(body.into()),
        }
    }

    /// Create a message whose plain-text body could not be extracted
    pub fn without_body(snippet: impl Into<String>) -> Self {
        Self {
            snippet: snippet.into(),
            body: None,
        }
    }
}
