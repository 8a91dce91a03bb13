//! Shared snapshot and status, read by the display layer.
//!
//! The store is a `tokio::sync::watch` channel: every write is applied to
//! the whole value under the channel's lock, and readers either take a
//! copy with [`SnapshotStore::current`] or wait for changes through
//! [`SnapshotStore::subscribe`].
//!
//! Writers tag every write with the [`Generation`] of the retry chain that
//! produced it. Once a chain has committed, writes from older chains are
//! dropped, and after [`SnapshotStore::close`] every write is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::types::{AnalyticsSnapshot, DisplayState, FetchStatus};

/// Identifier of one retry chain, increasing with every chain started.
pub type Generation = u64;

/// Everything a display layer needs at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreView {
    /// Last committed snapshot, kept through errors
    pub snapshot: Option<Arc<AnalyticsSnapshot>>,
    pub status: FetchStatus,
    pub loading: bool,
    committed_generation: Generation,
    closed: bool,
}

impl StoreView {
    /// Generation of the chain that committed `snapshot` (0 before any commit)
    pub fn committed_generation(&self) -> Generation {
        self.committed_generation
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn display_state(&self) -> DisplayState<'_> {
        let error = self.status.error_message();
        match &self.snapshot {
            Some(snapshot) => DisplayState::Ready {
                snapshot: snapshot.as_ref(),
                error,
            },
            None if self.loading => DisplayState::Loading,
            None => DisplayState::NoData { error },
        }
    }

    fn rejects(&self, generation: Generation) -> bool {
        self.closed || generation < self.committed_generation
    }
}

#[derive(Debug)]
struct Inner {
    state: watch::Sender<StoreView>,
    next_generation: AtomicU64,
}

/// Cloneable handle to the shared analytics state
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(StoreView::default());
        Self {
            inner: Arc::new(Inner {
                state,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Allocate the generation for a new retry chain
    pub fn begin_chain(&self) -> Generation {
        self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the snapshot wholesale and clear any error.
    ///
    /// Returns `false` when the write was dropped as stale.
    pub fn commit(&self, generation: Generation, snapshot: AnalyticsSnapshot) -> bool {
        self.write(generation, "commit", |state| {
            let unchanged = state.snapshot.as_deref() == Some(&snapshot)
                && state.status == FetchStatus::Success
                && !state.loading
                && state.committed_generation == generation;

            state.snapshot = Some(Arc::new(snapshot));
            state.status = FetchStatus::Success;
            state.loading = false;
            state.committed_generation = generation;
            !unchanged
        })
    }

    /// Record a failure; the last good snapshot stays visible.
    pub fn set_error(&self, generation: Generation, attempt: u32, message: String) -> bool {
        self.write(generation, "set_error", |state| {
            state.status = FetchStatus::Failed { attempt, message };
            state.loading = false;
            true
        })
    }

    /// Mark an attempt as started (status becomes `Loading`) or finished.
    pub fn set_loading(&self, generation: Generation, loading: bool) -> bool {
        self.write(generation, "set_loading", |state| {
            let before = (state.loading, state.status.clone());
            state.loading = loading;
            if loading {
                state.status = FetchStatus::Loading;
            }
            before != (state.loading, state.status.clone())
        })
    }

    /// Copy of the current state
    pub fn current(&self) -> StoreView {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every accepted change
    pub fn subscribe(&self) -> watch::Receiver<StoreView> {
        self.inner.state.subscribe()
    }

    /// Whether the status currently carries an error
    pub fn has_error(&self) -> bool {
        self.inner.state.borrow().status.is_error()
    }

    /// Whether writes from `generation` would now be dropped
    pub fn is_superseded(&self, generation: Generation) -> bool {
        self.inner.state.borrow().rejects(generation)
    }

    /// Stop accepting writes. Readers keep the final state.
    pub fn close(&self) {
        self.inner.state.send_modify(|state| {
            state.closed = true;
            state.loading = false;
        });
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.borrow().closed
    }

    fn write(
        &self,
        generation: Generation,
        op: &'static str,
        apply: impl FnOnce(&mut StoreView) -> bool,
    ) -> bool {
        let mut accepted = false;
        self.inner.state.send_if_modified(|state| {
            if state.rejects(generation) {
                tracing::debug!(
                    generation,
                    committed = state.committed_generation,
                    closed = state.closed,
                    op,
                    "Dropping stale store write"
                );
                return false;
            }
            accepted = true;
            apply(state)
        });
        accepted
    }
}
