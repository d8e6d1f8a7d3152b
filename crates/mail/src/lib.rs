//! Mail crate - Gmail access and notification classification
//!
//! This crate provides the domain logic for the Atalaya service:
//! - Per-address OAuth credential management (provisioning and refresh)
//! - Gmail API client for the single unread-message lookup
//! - Ordered-rule classification of notification email bodies
//! - The mailbox adapter trait that isolates handlers from the provider
//!
//! This crate has no HTTP-server dependencies; the service facade lives
//! in the app crate.

pub mod adapter;
pub mod classify;
pub mod config;
pub mod gmail;
pub mod models;

pub use adapter::UnreadMailbox;
pub use classify::{Classification, Classifier, Label};
pub use config::GmailCredentials;
pub use gmail::{GmailAuth, GmailClient, NotProvisionedError, StoredToken, TokenStore};
pub use models::UnreadMessage;
