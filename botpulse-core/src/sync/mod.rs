//! Fetch-retry-poll state machine
//!
//! - [`SnapshotStore`]: last good snapshot plus current status
//! - [`RetryController`]: health-gated fetch with fixed-delay retries
//! - [`PollScheduler`]: startup fetch, recurring refresh, manual refresh

mod retry;
mod scheduler;
mod store;

pub use retry::{ChainReport, RetryController, RetryPolicy, RetryState};
pub use scheduler::PollScheduler;
pub use store::{Generation, SnapshotStore, StoreView};
