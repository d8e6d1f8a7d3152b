//! Gmail API HTTP client
//!
//! Implements the single unread-message lookup against the Gmail API.
//! Uses synchronous HTTP (ureq); remote calls block the handling thread
//! for their full duration.

use anyhow::{Context, Result};
use log::debug;

use super::GmailAuth;
use super::api::{GmailMessage, ListMessagesResponse};
use super::normalize;
use crate::adapter::UnreadMailbox;
use crate::models::UnreadMessage;

/// Gmail API client bound to a set of OAuth client credentials
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// List unread messages in the inbox of `address`.
    ///
    /// The provider lists most-recent-first, so the first entry is the
    /// latest unread message.
    pub fn list_unread(&self, address: &str) -> Result<ListMessagesResponse> {
        let access_token = self.auth.access_token_for(address)?;

        let url = format!(
            "{}/users/{}/messages?labelIds=INBOX&q={}",
            Self::BASE_URL,
            urlencoding::encode(address),
            urlencoding::encode("is:unread"),
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        Ok(list)
    }

    /// Get full message details by ID
    pub fn get_message(&self, address: &str, id: &str) -> Result<GmailMessage> {
        let access_token = self.auth.access_token_for(address)?;

        let url = format!(
            "{}/users/{}/messages/{}?format=full",
            Self::BASE_URL,
            urlencoding::encode(address),
            id,
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send get message request")?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")?;

        Ok(message)
    }
}

impl UnreadMailbox for GmailClient {
    fn fetch_latest_unread(&self, address: &str) -> Result<Option<UnreadMessage>> {
        let list = self.list_unread(address)?;

        let Some(first) = list.messages.unwrap_or_default().into_iter().next() else {
            debug!("No unread messages for {}", address);
            return Ok(None);
        };

        let message = self.get_message(address, &first.id)?;
        Ok(Some(normalize::to_unread_message(message)))
    }
}
