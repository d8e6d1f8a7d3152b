//! Per-address credential persistence
//!
//! Tokens live as flat JSON files in the config directory, one file per
//! mailbox address. A file that is missing, unreadable, or unparseable
//! reads as "no credential"; the address must then be re-provisioned.
//! There is no locking: two requests refreshing the same address race
//! and the last writer wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Seconds before nominal expiry at which a token is treated as expired
const EXPIRY_BUFFER_SECS: i64 = 300;

/// Stored token material for one mailbox address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp of expiry, if the provider reported one
    pub expires_at: Option<i64>,
}

impl StoredToken {
    /// Whether the access token is still usable at `now` (Unix seconds).
    ///
    /// A token without a recorded expiry is treated as expired and must
    /// be refreshed before use.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at > now + EXPIRY_BUFFER_SECS)
    }

    /// Whether the access token is still usable right now
    pub fn is_valid_now(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }
}

/// Flat on-disk store of per-address credentials
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Create a store in the shared config directory
    pub fn open_default() -> Result<Self> {
        let dir = config::config_dir().context("Could not determine config directory")?;
        Ok(Self::new(dir))
    }

    /// Path of the token file for `address`
    fn token_path(&self, address: &str) -> PathBuf {
        self.dir.join(format!("token_{}.json", address))
    }

    /// Load the credential for `address`.
    ///
    /// A missing or corrupt file is treated as no credential rather
    /// than an error; the caller falls back to provisioning.
    pub fn load(&self, address: &str) -> Option<StoredToken> {
        let content = fs::read_to_string(self.token_path(address)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Persist the credential for `address`
    pub fn save(&self, address: &str, token: &StoredToken) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create token directory: {}", self.dir.display()))?;

        let path = self.token_path(address);
        let content = serde_json::to_string_pretty(token)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write token file: {}", path.display()))?;
        Ok(())
    }
}
