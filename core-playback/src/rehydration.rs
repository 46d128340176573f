//! # Rehydration
//!
//! Restores the persisted session once at startup and signals completion
//! exactly once, whether or not anything was restored.
//!
//! ## Workflow
//!
//! 1. Load the persisted snapshot from the settings store
//! 2. Hand it to [`QueueCoordinator::restore`], which validates it and
//!    rebuilds the engine window (or drops to idle)
//! 3. Mark the coordinator hydrated, complete the [`HydrationSignal`] and emit
//!    `QueueEvent::Hydrated`
//!
//! Consumers that must not act on a half-restored player await
//! [`HydrationSignal::wait`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_runtime::events::QueueEvent;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::coordinator::QueueCoordinator;
use crate::persistence::QueueStatePersister;

/// One-shot completion flag that any number of tasks can await.
#[derive(Debug, Clone)]
pub struct HydrationSignal {
    done: Arc<watch::Sender<bool>>,
}

impl HydrationSignal {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            done: Arc::new(done),
        }
    }

    /// Complete the signal. Returns `false` if it was already complete.
    pub fn mark_complete(&self) -> bool {
        self.done.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_complete(&self) -> bool {
        *self.done.borrow()
    }

    /// Resolves once the signal is complete (immediately if it already is).
    pub async fn wait(&self) {
        let mut receiver = self.done.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = receiver.wait_for(|done| *done).await;
    }
}

impl Default for HydrationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// What startup restore ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RehydrationOutcome {
    /// A session with `length` entries is live again.
    Restored { length: usize },
    /// Nothing was stored (or the stored queue was empty).
    Empty,
    /// The stored session was unusable and the player started idle.
    Discarded { reason: String },
    /// Restore already ran in this process.
    AlreadyHydrated,
}

impl RehydrationOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RehydrationOutcome::Restored { .. })
    }
}

/// Runs startup restore at most once.
pub struct RehydrationController {
    persister: Arc<QueueStatePersister>,
    signal: HydrationSignal,
    started: AtomicBool,
}

impl RehydrationController {
    pub fn new(persister: Arc<QueueStatePersister>) -> Self {
        Self {
            persister,
            signal: HydrationSignal::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Handle to the completion signal.
    pub fn signal(&self) -> HydrationSignal {
        self.signal.clone()
    }

    /// Complete hydration without restoring anything (restore disabled).
    pub fn skip(&self, coordinator: &QueueCoordinator) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        self.finish(coordinator, &RehydrationOutcome::Empty);
    }

    #[instrument(skip(self, coordinator))]
    pub async fn rehydrate(&self, coordinator: &QueueCoordinator) -> RehydrationOutcome {
        if self.started.swap(true, Ordering::AcqRel) {
            return RehydrationOutcome::AlreadyHydrated;
        }

        let outcome = match self.persister.load().await {
            Ok(None) => RehydrationOutcome::Empty,
            Ok(Some(persisted)) => match coordinator.restore(persisted).await {
                Ok(0) => RehydrationOutcome::Empty,
                Ok(length) => RehydrationOutcome::Restored { length },
                Err(e) => {
                    warn!(error = %e, "Discarding persisted session");
                    RehydrationOutcome::Discarded {
                        reason: e.to_string(),
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                RehydrationOutcome::Discarded {
                    reason: e.to_string(),
                }
            }
        };

        self.finish(coordinator, &outcome);
        outcome
    }

    fn finish(&self, coordinator: &QueueCoordinator, outcome: &RehydrationOutcome) {
        coordinator.mark_hydrated();
        if self.signal.mark_complete() {
            let length = match outcome {
                RehydrationOutcome::Restored { length } => *length,
                _ => 0,
            };
            info!(?outcome, "Hydration complete");
            coordinator.emit_queue(QueueEvent::Hydrated {
                restored: outcome.is_restored(),
                length,
            });
        }
    }
}

impl std::fmt::Debug for RehydrationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RehydrationController")
            .field("persister", &self.persister)
            .field("complete", &self.signal.is_complete())
            .finish()
    }
}
