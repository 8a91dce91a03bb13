//! Background refresh of the analytics snapshot.
//!
//! [`PollScheduler`] starts a chain as soon as it is created, then a
//! recurring timer starts another one every poll interval. A tick is
//! skipped while any chain is still running or the store shows an error,
//! so periodic polling never piles on top of a retry chain. A manual
//! [`refresh`](PollScheduler::refresh) is never skipped.
//!
//! Chains are independent tasks. Overlapping chains race, and the store's
//! generation check keeps an older chain from overwriting a newer commit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::retry::{shutdown_requested, ChainReport, RetryController};
use super::store::SnapshotStore;
use crate::api::HttpTransport;
use crate::config::ApiConfig;
use crate::error::Result;

/// What started a chain, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Timer,
    Manual,
}

/// Owns the refresh timer and the manual refresh entry point.
///
/// Must be created inside a tokio runtime. Dropping the scheduler has the
/// same effect as [`shutdown`](Self::shutdown) without waiting for the
/// timer task to finish.
#[derive(Debug)]
pub struct PollScheduler {
    controller: RetryController,
    running: Arc<AtomicUsize>,
    shutdown: watch::Sender<bool>,
    ticker: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl PollScheduler {
    /// Start polling with `controller`, refreshing every `poll_interval`.
    ///
    /// A zero `poll_interval` disables the timer; only the startup chain
    /// and manual refreshes run.
    pub fn start(controller: RetryController, poll_interval: Duration) -> Self {
        let (shutdown, ticker_shutdown) = watch::channel(false);
        let running = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            interval_ms = poll_interval.as_millis() as u64,
            max_attempts = controller.policy().max_attempts,
            "Starting analytics poller"
        );

        spawn_chain(&controller, &running, shutdown.subscribe(), Trigger::Startup);
        let ticker = if poll_interval.is_zero() {
            tracing::warn!("Poll interval is zero, scheduled refresh disabled");
            None
        } else {
            Some(tokio::spawn(run_ticker(
                controller.clone(),
                running.clone(),
                ticker_shutdown,
                poll_interval,
            )))
        };

        Self {
            controller,
            running,
            shutdown,
            ticker,
            poll_interval,
        }
    }

    /// Validate `config`, build the client stack on a fresh store and start
    /// polling.
    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &ApiConfig) -> Result<Self> {
        config.validate()?;
        let controller = RetryController::from_config(transport, config, SnapshotStore::new());
        Ok(Self::start(controller, config.poll_interval()))
    }

    pub fn store(&self) -> &SnapshotStore {
        self.controller.store()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of chains that have started and not yet finished
    pub fn running_chains(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Start a new chain at attempt 0 regardless of the error state.
    ///
    /// The status switches to `Loading` before this returns, clearing any
    /// error that would make the timer skip.
    pub fn refresh(&self) -> JoinHandle<ChainReport> {
        spawn_chain(
            &self.controller,
            &self.running,
            self.shutdown.subscribe(),
            Trigger::Manual,
        )
    }

    /// Cancel the timer and pending retries, close the store, and wait for
    /// the timer task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
        tracing::info!("Analytics poller stopped");
    }

    fn stop(&mut self) {
        self.shutdown.send_replace(true);
        self.controller.store().close();
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Decrements the running-chain count when the chain task ends or is dropped
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn enter(running: &Arc<AtomicUsize>) -> Self {
        running.fetch_add(1, Ordering::SeqCst);
        Self(running.clone())
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn spawn_chain(
    controller: &RetryController,
    running: &Arc<AtomicUsize>,
    shutdown: watch::Receiver<bool>,
    trigger: Trigger,
) -> JoinHandle<ChainReport> {
    let generation = controller.store().begin_chain();
    controller.store().set_loading(generation, true);
    tracing::debug!(generation, ?trigger, "Starting retry chain");

    let guard = RunningGuard::enter(running);
    let controller = controller.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let report = controller.run_chain(generation, shutdown).await;
        tracing::debug!(
            generation,
            ?trigger,
            state = ?report.state,
            attempts = report.attempts,
            "Retry chain finished"
        );
        report
    })
}

async fn run_ticker(
    controller: RetryController,
    running: Arc<AtomicUsize>,
    mut shutdown: watch::Receiver<bool>,
    period: Duration,
) {
    let chain_shutdown = shutdown.clone();
    // The startup chain covers t=0, first tick is one period later
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let in_flight = running.load(Ordering::SeqCst);
                if in_flight > 0 {
                    tracing::debug!(
                        in_flight,
                        "Skipping scheduled refresh while a chain is running"
                    );
                } else if controller.store().has_error() {
                    tracing::debug!("Skipping scheduled refresh while an error is shown");
                } else {
                    spawn_chain(&controller, &running, chain_shutdown.clone(), Trigger::Timer);
                }
            }
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
}
