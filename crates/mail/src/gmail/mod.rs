//! Gmail API integration
//!
//! This module provides:
//! - Per-address OAuth credential storage and refresh
//! - Interactive credential provisioning (operator-run)
//! - Gmail API client for the unread-message lookup
//! - Payload normalization into the domain model

mod auth;
mod client;
mod normalize;
mod token_store;

pub use auth::{GmailAuth, NotProvisionedError};
pub use client::GmailClient;
pub use normalize::to_unread_message;
pub use token_store::{StoredToken, TokenStore};

/// Gmail API response types
pub mod api {
    use serde::Deserialize;

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just the ID)
    #[derive(Debug, Deserialize)]
    pub struct MessageRef {
        pub id: String,
    }

    /// Full message from the Gmail API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        pub snippet: String,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing the body and any nested parts
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub mime_type: Option<String>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Message body (base64-encoded data)
    #[derive(Debug, Deserialize)]
    pub struct MessageBody {
        pub size: Option<u32>,
        pub data: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub mime_type: Option<String>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }
}
