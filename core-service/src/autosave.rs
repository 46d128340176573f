//! Keeps the stored session in step with the live snapshot.

use std::sync::Arc;

use core_playback::{PersistedQueueState, PlayerSnapshot, QueueStatePersister};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Save the persisted projection of every published snapshot that differs
/// from the last one written. Returns when the snapshot channel closes.
pub(crate) async fn run(
    mut updates: watch::Receiver<PlayerSnapshot>,
    persister: Arc<QueueStatePersister>,
) {
    let mut last_saved: Option<PersistedQueueState> = None;

    while updates.changed().await.is_ok() {
        let state = PersistedQueueState::from(&*updates.borrow_and_update());
        if last_saved.as_ref() == Some(&state) {
            continue;
        }

        match persister.save(&state).await {
            Ok(()) => last_saved = Some(state),
            Err(e) => warn!(error = %e, "Failed to persist session"),
        }
    }

    debug!("Snapshot channel closed, autosave stopped");
}
