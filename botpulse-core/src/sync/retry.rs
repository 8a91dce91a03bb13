//! Fixed-delay retry chains around the health-gated fetch.
//!
//! One chain starts at attempt 0. Every attempt is a fresh probe followed,
//! if the probe passes, by the analytics request. A failure with budget
//! left publishes a "Retrying..." status and sleeps for the configured
//! delay; a failure with the budget spent publishes the final status and
//! ends the chain. Every path ends in a store write, never in an error
//! returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::store::{Generation, SnapshotStore};
use crate::api::{AnalyticsFetcher, HealthProbe, HttpTransport};
use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::types::AnalyticsSnapshot;

/// Retry budget of one chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt, not total attempts: a
    /// chain makes at most `max_attempts + 1` fetch attempts.
    pub max_attempts: u32,
    /// Constant delay before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
        }
    }
}

/// State of a retry chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Attempt `n` (0-based) is next or in flight
    Attempting(u32),
    /// A snapshot was committed
    Succeeded,
    /// The budget ran out
    Exhausted,
    /// Stopped early: shut down, or a newer chain already committed
    Abandoned,
}

impl RetryState {
    pub fn on_success(self) -> Self {
        match self {
            RetryState::Attempting(_) => RetryState::Succeeded,
            other => other,
        }
    }

    pub fn on_failure(self, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting(n) if n < policy.max_attempts => RetryState::Attempting(n + 1),
            RetryState::Attempting(_) => RetryState::Exhausted,
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RetryState::Attempting(_))
    }
}

/// How a chain ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub generation: Generation,
    pub state: RetryState,
    /// Attempts actually started (probe issued)
    pub attempts: u32,
    /// Error of the last failed attempt, cleared by a success
    pub last_error: Option<FetchError>,
}

impl ChainReport {
    pub fn succeeded(&self) -> bool {
        self.state == RetryState::Succeeded
    }
}

/// Drives retry chains and writes their results into the store
#[derive(Debug, Clone)]
pub struct RetryController {
    probe: HealthProbe,
    fetcher: AnalyticsFetcher,
    policy: RetryPolicy,
    store: SnapshotStore,
}

impl RetryController {
    pub fn new(
        probe: HealthProbe,
        fetcher: AnalyticsFetcher,
        policy: RetryPolicy,
        store: SnapshotStore,
    ) -> Self {
        Self {
            probe,
            fetcher,
            policy,
            store,
        }
    }

    /// Probe and fetcher for `config.base_url` over one shared transport
    pub fn from_config(
        transport: Arc<dyn HttpTransport>,
        config: &ApiConfig,
        store: SnapshotStore,
    ) -> Self {
        let base_url = config.normalized_base_url();
        Self::new(
            HealthProbe::new(transport.clone(), base_url),
            AnalyticsFetcher::new(transport, base_url),
            RetryPolicy::from_config(config),
            store,
        )
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One health-gated attempt; the fetcher is not called when the probe fails
    pub async fn attempt_once(&self) -> Result<AnalyticsSnapshot, FetchError> {
        if !self.probe.probe().await {
            return Err(FetchError::HealthUnavailable);
        }
        self.fetcher.fetch().await
    }

    /// Run a new chain to completion, with no way to cancel it
    pub async fn run(&self) -> ChainReport {
        let generation = self.store.begin_chain();
        let (_stop, shutdown) = watch::channel(false);
        self.run_chain(generation, shutdown).await
    }

    /// Run the chain `generation` until it succeeds, exhausts its budget,
    /// or is abandoned because `shutdown` flipped to `true` or a newer
    /// chain committed first.
    pub async fn run_chain(
        &self,
        generation: Generation,
        mut shutdown: watch::Receiver<bool>,
    ) -> ChainReport {
        let mut state = RetryState::Attempting(0);
        let mut attempts = 0;
        let mut last_error = None;

        while let RetryState::Attempting(attempt) = state {
            if *shutdown.borrow() || self.store.is_superseded(generation) {
                tracing::debug!(generation, attempt, "Abandoning retry chain");
                state = RetryState::Abandoned;
                break;
            }

            attempts += 1;
            self.store.set_loading(generation, true);

            match self.attempt_once().await {
                Ok(snapshot) => {
                    tracing::info!(
                        generation,
                        attempt,
                        total_users = snapshot.total_users,
                        total_messages = snapshot.total_messages,
                        days = snapshot.daily_messages.len(),
                        "Committing analytics snapshot"
                    );
                    self.store.commit(generation, snapshot);
                    last_error = None;
                    state = state.on_success();
                }
                Err(err) => {
                    state = match state.on_failure(&self.policy) {
                        RetryState::Attempting(next) => {
                            tracing::info!(
                                generation,
                                attempt = next,
                                max = self.policy.max_attempts,
                                error = %err,
                                "Analytics fetch failed, retrying"
                            );
                            self.store.set_error(
                                generation,
                                next,
                                err.retrying_message(next, self.policy.max_attempts),
                            );
                            if !self.store.is_superseded(generation)
                                && self.wait_retry(&mut shutdown).await
                            {
                                RetryState::Attempting(next)
                            } else {
                                RetryState::Abandoned
                            }
                        }
                        terminal => {
                            tracing::warn!(
                                generation,
                                attempt,
                                error = %err,
                                "Analytics fetch failed, retries exhausted"
                            );
                            self.store
                                .set_error(generation, attempt, err.exhausted_message());
                            terminal
                        }
                    };
                    last_error = Some(err);
                }
            }
        }

        ChainReport {
            generation,
            state,
            attempts,
            last_error,
        }
    }

    /// Sleep for the retry delay. `false` if shutdown was requested first.
    async fn wait_retry(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.policy.delay) => true,
            _ = shutdown_requested(shutdown) => false,
        }
    }
}

/// Resolves once `rx` reads `true`; never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analytics_url, health_url, sample_body, ScriptedTransport};
    use crate::types::FetchStatus;
    use tokio::time::Instant;

    fn controller(transport: &Arc<ScriptedTransport>) -> RetryController {
        let config = ApiConfig {
            base_url: crate::testing::BASE_URL.to_string(),
            ..Default::default()
        };
        RetryController::from_config(transport.clone(), &config, SnapshotStore::new())
    }

    #[test]
    fn test_state_transitions() {
        let policy = RetryPolicy::default();

        assert_eq!(
            RetryState::Attempting(0).on_failure(&policy),
            RetryState::Attempting(1)
        );
        assert_eq!(
            RetryState::Attempting(2).on_failure(&policy),
            RetryState::Attempting(3)
        );
        assert_eq!(
            RetryState::Attempting(3).on_failure(&policy),
            RetryState::Exhausted
        );
        assert_eq!(
            RetryState::Attempting(2).on_success(),
            RetryState::Succeeded
        );
        assert_eq!(
            RetryState::Exhausted.on_failure(&policy),
            RetryState::Exhausted
        );
        assert!(RetryState::Abandoned.is_terminal());
        assert!(!RetryState::Attempting(0).is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.healthy().analytics(200, sample_body());
        let controller = controller(&transport);

        let report = controller.run().await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
        assert!(report.last_error.is_none());

        let view = controller.store().current();
        assert_eq!(view.status, FetchStatus::Success);
        assert!(!view.loading);
        assert_eq!(view.snapshot.unwrap().total_users, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_reports_retry_then_probes_again() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.unhealthy();
        let controller = controller(&transport);
        let mut rx = controller.store().subscribe();
        let started = Instant::now();

        let chain = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run().await }
        });

        let first = rx
            .wait_for(|v| v.status.is_error())
            .await
            .unwrap()
            .status
            .clone();
        assert_eq!(
            first,
            FetchStatus::Failed {
                attempt: 1,
                message: "API service is not available - Retrying... (1/3)".to_string()
            }
        );
        assert_eq!(transport.calls(&analytics_url()), 0);

        let second = rx
            .wait_for(|v| matches!(v.status, FetchStatus::Failed { attempt: 2, .. }))
            .await
            .unwrap()
            .status
            .clone();
        assert_eq!(
            second.error_message(),
            Some("API service is not available - Retrying... (2/3)")
        );
        assert_eq!(transport.calls(&health_url()), 2);
        assert!(started.elapsed() >= Duration::from_millis(2000));

        let report = chain.await.unwrap();
        assert_eq!(report.state, RetryState::Exhausted);
        assert_eq!(report.last_error, Some(FetchError::HealthUnavailable));
        assert_eq!(transport.calls(&analytics_url()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_exhausts_budget() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.healthy().analytics(500, r#"{"error":"db down"}"#);
        let controller = controller(&transport);
        let started = Instant::now();

        let report = controller.run().await;

        assert_eq!(report.state, RetryState::Exhausted);
        assert_eq!(report.attempts, 4);
        assert_eq!(transport.calls(&analytics_url()), 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3 * 2000));
        assert!(elapsed < Duration::from_millis(4 * 2000));

        let view = controller.store().current();
        assert_eq!(
            view.status,
            FetchStatus::Failed {
                attempt: 3,
                message: "db down - Max retries reached. Please try again later.".to_string()
            }
        );
        assert!(view.snapshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failures() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .healthy()
            .analytics(500, r#"{"error":"db down"}"#)
            .analytics(200, "[]")
            .analytics(200, sample_body());
        let controller = controller(&transport);

        let report = controller.run().await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 3);
        assert!(report.last_error.is_none());
        assert_eq!(controller.store().current().status, FetchStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_chain_keeps_previous_snapshot() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .healthy()
            .analytics(200, sample_body())
            .analytics(503, "");
        let controller = controller(&transport);

        assert!(controller.run().await.succeeded());
        let report = controller.run().await;

        assert_eq!(report.state, RetryState::Exhausted);
        let view = controller.store().current();
        assert_eq!(
            view.status.error_message(),
            Some("Server error: 503 - Max retries reached. Please try again later.")
        );
        assert_eq!(view.snapshot.unwrap().total_messages, 340);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retry_budget() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.unhealthy();
        let store = SnapshotStore::new();
        let config = ApiConfig {
            base_url: crate::testing::BASE_URL.to_string(),
            max_attempts: 0,
            ..Default::default()
        };
        let controller = RetryController::from_config(transport.clone(), &config, store);

        let report = controller.run().await;
        assert_eq!(report.state, RetryState::Exhausted);
        assert_eq!(report.attempts, 1);
        assert_eq!(
            controller.store().current().status.error_message(),
            Some("API service is not available - Max retries reached. Please try again later.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.unhealthy();
        let controller = controller(&transport);
        let mut rx = controller.store().subscribe();
        let (stop, shutdown) = watch::channel(false);

        let generation = controller.store().begin_chain();
        let chain = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run_chain(generation, shutdown).await }
        });

        rx.wait_for(|v| v.status.is_error()).await.unwrap();
        stop.send(true).unwrap();

        let report = chain.await.unwrap();
        assert_eq!(report.state, RetryState::Abandoned);
        assert_eq!(report.attempts, 1);
        assert_eq!(transport.calls(&health_url()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_chain_stops_retrying() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.unhealthy();
        let controller = controller(&transport);
        let store = controller.store().clone();
        let mut rx = store.subscribe();

        let chain = tokio::spawn({
            let controller = controller.clone();
            async move { controller.run().await }
        });
        rx.wait_for(|v| v.status.is_error()).await.unwrap();

        // A newer chain lands a snapshot while the old one sleeps
        let newer = store.begin_chain();
        store.commit(newer, AnalyticsSnapshot::default());

        let report = chain.await.unwrap();
        assert_eq!(report.state, RetryState::Abandoned);
        assert_eq!(report.attempts, 1);
        assert_eq!(store.current().status, FetchStatus::Success);
    }
}
