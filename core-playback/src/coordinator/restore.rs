//! Restoring a persisted session into the engine.

use core_runtime::events::PlaybackEvent;
use tracing::{info, instrument, warn};

use super::{Activity, QueueCoordinator};
use crate::error::{QueueError, Result};
use crate::persistence::PersistedQueueState;
use crate::state::validate_queue_integrity;

impl QueueCoordinator {
    /// Rebuild the live session from `persisted`.
    ///
    /// Settings are applied first. The queue itself is restored all or nothing:
    /// an integrity failure or an unresolvable window song leaves the
    /// coordinator idle. The engine is muted while the window loads and gets
    /// its volume back whatever the outcome. A saved position the engine
    /// refuses is dropped rather than failing the restore.
    ///
    /// Returns the restored queue length (0 when nothing was stored).
    #[instrument(skip(self, persisted), fields(length = persisted.queue_ids.len()))]
    pub async fn restore(&self, persisted: PersistedQueueState) -> Result<usize> {
        let _guard = self.begin_mutation("rehydrate", Activity::Queue)?;

        let outcome = self.restore_locked(&persisted).await;
        let outcome = self.settle(outcome).await;

        let (volume, muted) = self.read(|state| (state.volume, state.is_muted));
        if let Err(e) = self
            .engine()
            .set_volume(if muted { 0.0 } else { volume })
            .await
        {
            warn!(error = %e, "Failed to restore engine volume");
        }

        outcome
    }

    /// Mark startup restore as finished in the published state.
    pub fn mark_hydrated(&self) {
        self.update(|state| state.has_hydrated = true);
    }

    async fn restore_locked(&self, persisted: &PersistedQueueState) -> Result<usize> {
        self.engine().set_volume(0.0).await?;
        self.engine().set_repeat_mode(persisted.repeat_mode).await?;

        let window_size = self.update(|state| {
            state.repeat_mode = persisted.repeat_mode;
            state.volume = persisted.volume.clamp(0.0, 1.0);
            state.is_muted = persisted.is_muted;
            state.shuffle_enabled = persisted.is_shuffle_enabled;
            state.play_source = persisted.play_source;
            state.source_context_id = persisted.source_context_id.clone();
            if persisted.window_size > 0 {
                state.window_size = persisted.window_size;
            }
            state.window_size
        });

        if persisted.is_empty() {
            info!("No queue to restore");
            return Ok(0);
        }

        validate_queue_integrity(
            &persisted.track_ids,
            &persisted.queue_ids,
            persisted.current_track_index,
            persisted.current_track_id,
        )?;
        let Some(current) = persisted.current_track_index else {
            return Err(QueueError::Integrity(
                "persisted queue has no current index".to_string(),
            ));
        };

        self.cache().lock().clear(window_size);
        let window = self.planner().plan(current, persisted.queue_ids.len());
        let track = self
            .materialize(&persisted.queue_ids, window, current)
            .await?;

        let position = if persisted.position > 0.0 {
            let position = if track.duration > 0.0 {
                persisted.position.min(track.duration)
            } else {
                persisted.position
            };
            match self.engine().seek_to(position).await {
                Ok(()) => position,
                Err(e) => {
                    warn!(error = %e, position, "Failed to restore position, starting from 0");
                    0.0
                }
            }
        } else {
            0.0
        };

        let length = persisted.queue_ids.len();
        let track_id = track.id;
        self.update(|state| {
            state.track_ids = persisted.track_ids.clone();
            state.queue_ids = persisted.queue_ids.clone();
            state.current_index = Some(current);
            state.duration = track.duration;
            state.current_track = Some(track);
            state.window = window;
            state.position = position;
            state.buffered = 0.0;
            state.is_playing = false;
        });

        info!(
            length,
            current,
            window_start = window.start,
            window_end = window.end,
            "Restored persisted queue"
        );
        self.emit_playback(PlaybackEvent::TrackChanged {
            track_id: track_id.get(),
            queue_index: current,
        });
        Ok(length)
    }
}
