//! # botpulse-core
//!
//! Core library for botpulse - a polling client for bot usage analytics.
//!
//! This library provides:
//! - Domain types for analytics snapshots and fetch status
//! - A health-gated HTTP client for the analytics API
//! - The fetch-retry-poll state machine that keeps a snapshot fresh
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Requests flow leaves-first:
//! - **[`HealthProbe`]** checks `GET /health` before every attempt
//! - **[`AnalyticsFetcher`]** requests `GET /analytics` and normalizes the payload
//! - **[`RetryController`]** runs retry chains with a fixed delay between attempts
//! - **[`PollScheduler`]** starts chains on startup, on a timer, and on demand
//! - **[`SnapshotStore`]** holds the last good snapshot and the current status
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use botpulse_core::{Config, PollScheduler, ReqwestTransport};
//!
//! # async fn run() -> botpulse_core::Result<()> {
//! let config = Config::load()?;
//! let transport = Arc::new(ReqwestTransport::new(&config.api)?);
//!
//! let scheduler = PollScheduler::from_config(transport, &config.api)?;
//! let mut updates = scheduler.store().subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("{:?}", updates.borrow().status);
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::{AnalyticsFetcher, HealthProbe, HttpResponse, HttpTransport, ReqwestTransport};
pub use config::Config;
pub use error::{Error, FetchError, Result};
pub use sync::{
    ChainReport, Generation, PollScheduler, RetryController, RetryPolicy, RetryState,
    SnapshotStore, StoreView,
};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod sync;
pub mod types;

#[cfg(test)]
mod testing;
