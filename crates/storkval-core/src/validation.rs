//! One validation cycle: fetch stats, fetch signed prices, submit a vote.
//!
//! The cycle is all-or-nothing with respect to `DisplayState`: data fields are
//! only replaced after every step succeeded, and a failure touches nothing but
//! the status and failure counter.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, OracleApi};
use crate::auth::TokenManager;
use crate::error::CycleError;
use crate::format::format_last_verified;
use crate::models::{MeResponse, UserStats, ValidationOutcome};
use crate::state::{CycleStatus, DisplayState};

/// Result of `run_cycle`; the error is the cycle-failed reason.
pub type CycleResult = Result<ValidationOutcome, CycleError>;

pub struct ValidationClient {
    api: Arc<dyn OracleApi>,
    tokens: Arc<TokenManager>,
    state: watch::Sender<DisplayState>,
    timezone: Tz,
}

impl ValidationClient {
    pub fn new(
        api: Arc<dyn OracleApi>,
        tokens: Arc<TokenManager>,
        state: watch::Sender<DisplayState>,
        timezone: Tz,
    ) -> Self {
        Self {
            api,
            tokens,
            state,
            timezone,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// A receiver for display snapshots
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.state.subscribe()
    }

    /// Run one cycle and publish its effect on `DisplayState`.
    pub async fn run_cycle(&self) -> CycleResult {
        let result = self.execute().await;

        match &result {
            Ok((stats, outcome)) => {
                info!(
                    asset = %outcome.asset,
                    msg_hash = %outcome.submitted_msg_hash,
                    message = %outcome.response_message,
                    valid = stats.valid_count,
                    invalid = stats.invalid_count,
                    "Validation cycle complete"
                );
                let (stats, outcome) = (stats.clone(), outcome.clone());
                self.state.send_modify(|state| {
                    state.stats = Some(stats);
                    state.outcome = Some(outcome);
                    state.status = CycleStatus::Idle;
                    state.last_cycle_at = Some(Utc::now());
                    state.cycles_succeeded += 1;
                });
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Validation cycle failed");
                let reason = e.to_string();
                self.state.send_modify(|state| {
                    state.status = CycleStatus::Error(reason);
                    state.last_cycle_at = Some(Utc::now());
                    state.cycles_failed += 1;
                });
            }
        }

        result.map(|(_, outcome)| outcome)
    }

    async fn execute(&self) -> Result<(UserStats, ValidationOutcome), CycleError> {
        if self.tokens.needs_refresh().await {
            self.set_status(CycleStatus::RefreshingToken);
        }
        let token = self.tokens.get_valid_token().await?;

        self.set_status(CycleStatus::Fetching);

        let me = self.call(self.api.fetch_me(&token)).await?;
        let stats = self.user_stats(me);
        debug!(email = %stats.email, "Fetched user stats");

        let prices = self.call(self.api.fetch_signed_prices(&token)).await?;
        let (asset, price) = prices
            .first_asset()
            .ok_or(CycleError::NoAssetData)?
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed signed price: {}", e)))?;
        let msg_hash = price.timestamped_signature.msg_hash;
        debug!(asset = %asset, msg_hash = %msg_hash, "Selected signed price");

        let response = self
            .call(self.api.submit_validation(&token, &msg_hash))
            .await?;

        Ok((
            stats,
            ValidationOutcome {
                asset,
                submitted_msg_hash: msg_hash,
                response_message: response.message,
            },
        ))
    }

    /// Await an API call; a 401 also drops the cached token so the next
    /// cycle logs in again.
    async fn call<T, F>(&self, request: F) -> Result<T, CycleError>
    where
        F: std::future::Future<Output = Result<T, ApiError>>,
    {
        match request.await {
            Ok(value) => Ok(value),
            Err(ApiError::Unauthorized) => {
                self.tokens.invalidate().await;
                Err(ApiError::Unauthorized.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn user_stats(&self, me: MeResponse) -> UserStats {
        let stats = me.data.stats;
        UserStats {
            email: me.data.email,
            id: me.data.id,
            valid_count: stats.stork_signed_prices_valid_count,
            invalid_count: stats.stork_signed_prices_invalid_count,
            last_verified_at: stats
                .stork_signed_prices_last_verified_at
                .map(|ts| format_last_verified(&ts, self.timezone)),
        }
    }

    fn set_status(&self, status: CycleStatus) {
        self.state.send_modify(|state| state.status = status);
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::testing::{FakeApi, StaticProvider};
    use super::*;
    use crate::auth::Credentials;
    use crate::format::DEFAULT_DISPLAY_TIMEZONE;

    fn client(
        api: Arc<FakeApi>,
        provider: Arc<StaticProvider>,
    ) -> (ValidationClient, watch::Receiver<DisplayState>) {
        let tokens = Arc::new(TokenManager::new(
            provider,
            Credentials::new("a@b.com", "pw"),
        ));
        let (tx, rx) = watch::channel(DisplayState::default());
        (
            ValidationClient::new(api, tokens, tx, DEFAULT_DISPLAY_TIMEZONE),
            rx,
        )
    }

    #[tokio::test]
    async fn test_successful_cycle_updates_display_state() {
        let api = Arc::new(FakeApi::happy());
        let provider = Arc::new(StaticProvider::ok());
        let (client, rx) = client(api.clone(), provider.clone());

        let outcome = client.run_cycle().await.unwrap();
        assert_eq!(outcome.submitted_msg_hash, "0xabc");
        assert_eq!(outcome.response_message, "accepted");

        let state = rx.borrow().clone();
        let stats = state.stats.unwrap();
        assert_eq!(stats.email, "a@b.com");
        assert_eq!(stats.id, "42");
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.invalid_count, 1);
        assert_eq!(stats.last_verified_at.as_deref(), Some("1/15/2025, 17:03:09"));
        assert_eq!(state.outcome.unwrap().response_message, "accepted");
        assert_eq!(state.status, CycleStatus::Idle);
        assert_eq!(state.cycles_succeeded, 1);

        assert_eq!(*api.submitted.lock().unwrap(), vec!["0xabc".to_string()]);
        assert_eq!(provider.calls(), 1);

        // All three calls used the same bearer token
        let seen = api.tokens_seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|t| *t == seen[0]));
    }

    #[tokio::test]
    async fn test_empty_prices_fail_without_touching_data() {
        let api = Arc::new(FakeApi::happy());
        let (client, rx) = client(api.clone(), Arc::new(StaticProvider::ok()));

        client.run_cycle().await.unwrap();
        let before = rx.borrow().clone();

        api.set_prices(r#"{"data":{}}"#);
        let err = client.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::NoAssetData));

        let after = rx.borrow().clone();
        assert_eq!(after.stats, before.stats);
        assert_eq!(after.outcome, before.outcome);
        assert!(after.status.is_error());
        assert_eq!(after.cycles_failed, 1);
        // No vote was submitted for the failed cycle
        assert_eq!(api.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_cycle_failure_leaves_state_empty() {
        let api = Arc::new(FakeApi::happy());
        api.set_prices(r#"{"data":{}}"#);
        let (client, rx) = client(api, Arc::new(StaticProvider::ok()));

        assert!(client.run_cycle().await.is_err());
        let state = rx.borrow().clone();
        assert!(state.stats.is_none());
        assert!(state.outcome.is_none());
    }

    #[tokio::test]
    async fn test_network_failure_aborts_cycle() {
        let api = Arc::new(FakeApi::happy());
        api.fail_me(503);
        let (client, rx) = client(api.clone(), Arc::new(StaticProvider::ok()));

        let err = client.run_cycle().await.unwrap_err();
        assert!(matches!(&err, CycleError::NetworkFailed(e) if e.is_server_error()));
        assert!(api.submitted.lock().unwrap().is_empty());
        assert!(rx.borrow().stats.is_none());
    }

    #[tokio::test]
    async fn test_authentication_failure_surfaces_as_cycle_failure() {
        let api = Arc::new(FakeApi::happy());
        let (client, rx) = client(api.clone(), Arc::new(StaticProvider::failing()));

        let err = client.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::AuthenticationFailed(_)));
        assert_eq!(api.me_calls(), 0);
        assert!(rx.borrow().status.is_error());
    }

    #[tokio::test]
    async fn test_unauthorized_invalidates_token() {
        let api = Arc::new(FakeApi::happy());
        let provider = Arc::new(StaticProvider::ok());
        let (client, _rx) = client(api.clone(), provider.clone());

        api.fail_me(401);
        assert!(client.run_cycle().await.is_err());
        assert_eq!(provider.calls(), 1);
        assert!(client.tokens().needs_refresh().await);

        // Next cycle logs in again
        let _ = client.run_cycle().await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_price_record_is_a_network_failure() {
        let api = Arc::new(FakeApi::happy());
        api.set_prices(r#"{"data":{"ETHUSD":{"price":"1"}}}"#);
        let (client, _rx) = client(api, Arc::new(StaticProvider::ok()));

        let err = client.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::NetworkFailed(ApiError::InvalidResponse(_))));
    }
}
