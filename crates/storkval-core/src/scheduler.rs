//! Two independent periodic activities: the validation cycle and the render tick.
//!
//! A validation tick that fires while the previous cycle is still running is
//! skipped, so there is never more than one cycle (and one vote) in flight.
//! Rendering only reads the latest `DisplayState` snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::auth::AuthError;
use crate::state::DisplayState;
use crate::validation::ValidationClient;

/// Clears the in-flight flag when the cycle task ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollingScheduler {
    client: Arc<ValidationClient>,
    in_flight: Arc<AtomicBool>,
    validation_every: Duration,
    render_every: Duration,
}

impl PollingScheduler {
    pub fn new(
        client: Arc<ValidationClient>,
        validation_every: Duration,
        render_every: Duration,
    ) -> Self {
        Self {
            client,
            in_flight: Arc::new(AtomicBool::new(false)),
            validation_every,
            render_every,
        }
    }

    /// Initial login followed by one cycle, both awaited.
    ///
    /// Only the login is fatal; a failed first cycle is shown like any other.
    pub async fn startup(&self) -> Result<(), AuthError> {
        self.client.tokens().get_valid_token().await?;
        info!("Initial login complete");

        if let Some(handle) = self.try_start_cycle() {
            if let Err(e) = handle.await {
                error!(error = %e, "Initial validation cycle panicked");
            }
        }
        Ok(())
    }

    /// Start a cycle unless one is already in flight.
    pub fn try_start_cycle(&self) -> Option<JoinHandle<()>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Previous validation cycle still running, skipping tick");
            return None;
        }

        let guard = InFlightGuard(self.in_flight.clone());
        let client = self.client.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            // Failures are already logged and reflected in DisplayState
            let _ = client.run_cycle().await;
        }))
    }

    /// Fire a validation cycle every interval, starting one interval from now.
    pub fn spawn_validation_activity(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let period = scheduler.validation_every;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                scheduler.try_start_cycle();
            }
        })
    }

    /// Call `render` with the latest snapshot every render interval.
    pub fn spawn_render_activity<F>(&self, mut render: F) -> JoinHandle<()>
    where
        F: FnMut(&DisplayState) + Send + 'static,
    {
        let rx = self.client.subscribe();
        let period = self.render_every;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let snapshot = rx.borrow().clone();
                render(&snapshot);
            }
        })
    }

    /// A receiver for display snapshots
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.client.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credentials, TokenManager};
    use crate::format::DEFAULT_DISPLAY_TIMEZONE;
    use crate::state::CycleStatus;
    use crate::validation::testing::{FakeApi, StaticProvider};
    use std::sync::Mutex;

    fn scheduler(api: Arc<FakeApi>, provider: Arc<StaticProvider>) -> Arc<PollingScheduler> {
        let tokens = Arc::new(TokenManager::new(
            provider,
            Credentials::new("a@b.com", "pw"),
        ));
        let (tx, _rx) = watch::channel(DisplayState::default());
        let client = Arc::new(ValidationClient::new(
            api,
            tokens,
            tx,
            DEFAULT_DISPLAY_TIMEZONE,
        ));
        Arc::new(PollingScheduler::new(
            client,
            Duration::from_millis(20),
            Duration::from_millis(5),
        ))
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let api = Arc::new(FakeApi::happy().gated());
        let scheduler = scheduler(api.clone(), Arc::new(StaticProvider::ok()));

        let first = scheduler.try_start_cycle().expect("first tick starts a cycle");
        // Wait until the cycle is parked inside fetch_me
        while api.me_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(scheduler.in_flight.load(Ordering::Acquire));
        assert!(scheduler.try_start_cycle().is_none());

        api.gate.as_ref().unwrap().add_permits(1);
        first.await.unwrap();

        assert!(!scheduler.in_flight.load(Ordering::Acquire));
        assert_eq!(api.me_calls(), 1);
        assert_eq!(api.submitted.lock().unwrap().len(), 1);

        // The next tick after completion runs normally
        api.gate.as_ref().unwrap().add_permits(1);
        scheduler.try_start_cycle().unwrap().await.unwrap();
        assert_eq!(api.me_calls(), 2);
    }

    #[tokio::test]
    async fn test_startup_logs_in_and_runs_first_cycle() {
        let api = Arc::new(FakeApi::happy());
        let provider = Arc::new(StaticProvider::ok());
        let scheduler = scheduler(api.clone(), provider.clone());

        scheduler.startup().await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(api.me_calls(), 1);

        let state = scheduler.subscribe().borrow().clone();
        assert_eq!(state.stats.unwrap().email, "a@b.com");
        assert_eq!(state.status, CycleStatus::Idle);
    }

    #[tokio::test]
    async fn test_startup_fails_when_login_fails() {
        let api = Arc::new(FakeApi::happy());
        let scheduler = scheduler(api.clone(), Arc::new(StaticProvider::failing()));

        assert!(scheduler.startup().await.is_err());
        assert_eq!(api.me_calls(), 0);
    }

    #[tokio::test]
    async fn test_startup_survives_failed_first_cycle() {
        let api = Arc::new(FakeApi::happy());
        api.set_prices(r#"{"data":{}}"#);
        let scheduler = scheduler(api, Arc::new(StaticProvider::ok()));

        scheduler.startup().await.unwrap();
        assert!(scheduler.subscribe().borrow().status.is_error());
    }

    #[tokio::test]
    async fn test_validation_activity_runs_periodically() {
        let api = Arc::new(FakeApi::happy());
        let scheduler = scheduler(api.clone(), Arc::new(StaticProvider::ok()));

        let handle = scheduler.spawn_validation_activity();
        tokio::time::sleep(Duration::from_millis(110)).await;
        handle.abort();

        assert!(api.me_calls() >= 2);
    }

    #[tokio::test]
    async fn test_render_activity_handles_empty_state() {
        let api = Arc::new(FakeApi::happy());
        let scheduler = scheduler(api.clone(), Arc::new(StaticProvider::ok()));

        let rendered = Arc::new(Mutex::new(Vec::new()));
        let sink = rendered.clone();
        let handle = scheduler.spawn_render_activity(move |state| {
            sink.lock()
                .unwrap()
                .push(crate::report::StatusReport::to_text(state));
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();

        let rendered = rendered.lock().unwrap();
        assert!(!rendered.is_empty());
        assert!(rendered[0].contains("Email : -"));
        // Rendering never triggers network activity
        assert_eq!(api.me_calls(), 0);
    }
}
