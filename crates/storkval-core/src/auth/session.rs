use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::token::{self, TokenDecodeError};

/// The current access token and its expiry, taken from the token's `exp` claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    expires_at_ms: i64,
}

impl Session {
    /// Build a session from a raw access token. Fails if the token carries no
    /// decodable expiry.
    pub fn from_token(access_token: String) -> Result<Self, TokenDecodeError> {
        let expires_at_ms = token::decode_expiry_ms(&access_token)?;
        Ok(Self {
            access_token,
            expires_at_ms,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    /// Expiry as a timestamp (for display/logging)
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at_ms)
    }
}

/// On-disk shape of the persisted token.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    #[serde(rename = "accessToken", alias = "bearerToken")]
    access_token: String,
}

/// Reads and writes the `{ "accessToken": ... }` artifact.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted session, if any. A stored token that no longer
    /// decodes is ignored rather than reported.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;
        let stored: StoredToken = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse token file {}", self.path.display()))?;

        match Session::from_token(stored.access_token) {
            Ok(session) => {
                debug!(path = %self.path.display(), "Loaded persisted access token");
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "Ignoring persisted access token");
                Ok(None)
            }
        }
    }

    /// Save the session's token, replacing any previous file.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let stored = StoredToken {
            access_token: session.access_token.clone(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the persisted token
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
