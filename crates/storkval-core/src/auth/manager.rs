//! Token lifecycle: hand out a valid access token, refreshing at most once
//! at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::provider::{AuthError, CredentialProvider, Credentials};
use super::session::{Session, SessionStore};
use super::token;

#[derive(Default)]
struct TokenState {
    session: Option<Session>,
    /// Message of the most recent failed refresh, cleared on success
    last_error: Option<String>,
}

pub struct TokenManager {
    provider: Arc<dyn CredentialProvider>,
    credentials: Credentials,
    store: Option<SessionStore>,
    /// Held for the whole check-and-refresh, so refreshes never overlap
    state: Mutex<TokenState>,
    /// Number of refresh attempts finished so far
    attempts: AtomicU64,
}

impl TokenManager {
    pub fn new(provider: Arc<dyn CredentialProvider>, credentials: Credentials) -> Self {
        Self {
            provider,
            credentials,
            store: None,
            state: Mutex::new(TokenState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Persist refreshed tokens to `store`
    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Seed the session from the persisted token, if one is stored.
    /// Returns whether a still-valid token was found.
    pub async fn load_persisted(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        match store.load() {
            Ok(Some(session)) if !token::is_expired(session.access_token(), now_ms()) => {
                info!(expires_at = ?session.expires_at(), "Reusing persisted access token");
                self.state.lock().await.session = Some(session);
                true
            }
            Ok(Some(_)) => {
                debug!("Persisted access token has expired");
                false
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Could not load persisted access token");
                false
            }
        }
    }

    /// Whether the next `get_valid_token` call would have to refresh.
    pub async fn needs_refresh(&self) -> bool {
        let state = self.state.lock().await;
        !Self::usable(&state)
    }

    /// Drop the cached and persisted token so the next call refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.session.take().is_some() {
            info!("Access token invalidated");
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, path = %store.path().display(), "Could not remove persisted access token");
            }
        }
    }

    /// Return the current token if still valid, otherwise refresh it through
    /// the credential provider. Callers arriving during a refresh wait for it
    /// and share its result.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if Self::usable(&state) {
            return Ok(Self::token_of(&state));
        }

        // A refresh finished while we were queued on the lock; adopt its failure.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(message) = &state.last_error {
                return Err(AuthError::Shared(message.clone()));
            }
        }

        let result = self.refresh(&mut state).await;
        self.attempts.fetch_add(1, Ordering::AcqRel);
        result
    }

    async fn refresh(&self, state: &mut TokenState) -> Result<String, AuthError> {
        info!("Access token expired or missing, refreshing");

        let fetched = match self.provider.fetch_token(&self.credentials).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                state.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let session = match Session::from_token(fetched.access_token) {
            Ok(session) => session,
            Err(e) => {
                let e = AuthError::from(e);
                warn!(error = %e, "Provider returned an unusable token");
                state.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        if let Some(reported) = fetched.expires_at_ms {
            debug!(
                claim_ms = session.expires_at_ms(),
                reported_ms = reported,
                "Token refreshed"
            );
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session) {
                warn!(error = %e, path = %store.path().display(), "Could not persist access token");
            }
        }

        let token = session.access_token().to_string();
        state.session = Some(session);
        state.last_error = None;
        info!("Access token refreshed");
        Ok(token)
    }

    fn usable(state: &TokenState) -> bool {
        state
            .session
            .as_ref()
            .map(|s| !token::is_expired(s.access_token(), now_ms()))
            .unwrap_or(false)
    }

    fn token_of(state: &TokenState) -> String {
        state
            .session
            .as_ref()
            .map(|s| s.access_token().to_string())
            .unwrap_or_default()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
