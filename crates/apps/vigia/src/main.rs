//! Vigia - single-endpoint Gmail alert relay
//!
//! Serves one POST route that reads the latest unread message of a
//! mailbox and extracts the action link from known notification
//! templates. Credentials are provisioned ahead of time with
//! `vigia provision <address>`.

use anyhow::{Context, Result};
use log::{error, info, warn};
use mail::{Classifier, GmailAuth, GmailClient, GmailCredentials};
use std::sync::Arc;

mod http;
mod routes;

use http::Server;

/// Default listening port when PORT is not set
const DEFAULT_PORT: u16 = 10000;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Bootstrap config directory
    config::init().context("Failed to initialize config directory")?;

    // Load Gmail client credentials from config file or environment
    let creds = match GmailCredentials::load() {
        Ok(creds) => creds,
        Err(e) => {
            if let Some(path) = GmailCredentials::default_credentials_path() {
                warn!(
                    "Gmail credentials not found. Either:\n\
                     1. Place your Google OAuth credentials at: {}\n\
                     2. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                    path.display()
                );
            }
            return Err(e);
        }
    };

    let auth = GmailAuth::new(creds.client_id, creds.client_secret)?;

    // `vigia provision <address>` runs the interactive authorization
    // flow and exits; serving never opens a browser.
    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        return match command.as_str() {
            "provision" => {
                let address = args.next().context("Usage: vigia provision <address>")?;
                auth.provision(&address)
            }
            other => anyhow::bail!("Unknown command: {} (expected: provision)", other),
        };
    }

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let mailbox = GmailClient::new(auth);
    let classifier = Classifier::new();

    let server = Server::bind(port)?;
    info!("Listening on 0.0.0.0:{}", port);

    server.serve(Arc::new(move |request| {
        routes::respond(request, &mailbox, &classifier)
    }))
}
