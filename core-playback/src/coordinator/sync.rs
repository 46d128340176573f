//! Reconciliation with the engine and host notifications.

use bridge_traits::{EngineEvent, EngineState, Song, SongId, TrackMetadataPatch};
use core_runtime::events::{PlaybackEvent, QueueEvent};
use tracing::{debug, error, info, instrument, warn};

use super::{Activity, QueueCoordinator};
use crate::error::{QueueError, Result};
use crate::state::validate_queue_integrity;

impl QueueCoordinator {
    /// Adopt the engine's active track as the current track.
    ///
    /// Returns `true` when the logical index changed.
    #[instrument(skip(self))]
    pub async fn sync_with_engine(&self) -> Result<bool> {
        let _guard = self.begin_mutation("sync", Activity::Silent)?;
        self.sync_locked().await
    }

    async fn sync_locked(&self) -> Result<bool> {
        let engine_queue = self.engine().queue().await?;
        let Some(active) = self.engine().active_index().await? else {
            return Ok(false);
        };
        let Some(engine_track) = engine_queue.get(active).cloned() else {
            warn!(active, engine_len = engine_queue.len(), "Engine active index out of range");
            return Ok(false);
        };

        let (queue_ids, window, current) =
            self.read(|state| (state.queue_ids.clone(), state.window, state.current_index));

        let expected = window.start + active;
        let index = if queue_ids.get(expected) == Some(&engine_track.id) {
            expected
        } else {
            match window
                .range()
                .find(|index| queue_ids.get(*index) == Some(&engine_track.id))
            {
                Some(index) => index,
                None => {
                    warn!(
                        track_id = %engine_track.id,
                        "Engine active track not found in window"
                    );
                    return Ok(false);
                }
            }
        };

        if current == Some(index) {
            return Ok(false);
        }

        let track_id = engine_track.id;
        self.update(|state| {
            state.current_index = Some(index);
            state.duration = engine_track.duration;
            state.current_track = Some(engine_track);
            state.position = 0.0;
            state.buffered = 0.0;
        });

        debug!(index, "Adopted engine active track");
        self.emit_playback(PlaybackEvent::TrackChanged {
            track_id: track_id.get(),
            queue_index: index,
        });
        Ok(true)
    }

    /// Check the live state against the queue invariants and the engine.
    ///
    /// A broken model drops to idle. An engine whose queue length drifted from
    /// the window is rebuilt around the current track. Returns whether
    /// everything was consistent.
    #[instrument(skip(self))]
    pub async fn validate_and_repair(&self) -> Result<bool> {
        let _guard = self.begin_mutation("repair", Activity::Silent)?;

        let (integrity, current, window) = self.read(|state| {
            (state.check_integrity(), state.current_index, state.window)
        });

        if let Err(e) = integrity {
            error!(error = %e, "Live queue state failed validation, resetting");
            self.reset_to_idle().await;
            return Ok(false);
        }

        let Some(current) = current else {
            return Ok(true);
        };

        let engine_len = self.engine().queue().await?.len();
        if engine_len == window.len() {
            return Ok(true);
        }

        warn!(
            engine_len,
            window_len = window.len(),
            "Engine queue drifted from window, rebuilding"
        );
        let queue_ids = self.read(|state| state.queue_ids.clone());
        let planned = self.planner().plan(current, queue_ids.len());
        let outcome = self.materialize(&queue_ids, planned, current).await;
        let track = self.settle(outcome).await?;

        self.update(|state| {
            state.window = planned;
            state.duration = track.duration;
            state.current_track = Some(track);
        });
        self.emit_queue(QueueEvent::WindowShifted {
            start: planned.start,
            end: planned.end,
        });
        Ok(false)
    }

    /// Replace the play order with `queue_ids` positioned at `index`.
    ///
    /// `queue_ids` must be a permutation of the current track list.
    #[instrument(skip(self, queue_ids), fields(length = queue_ids.len()))]
    pub async fn reconcile_queue(&self, queue_ids: Vec<SongId>, index: usize) -> Result<()> {
        let _guard = self.begin_mutation("reconcile", Activity::Queue)?;

        let track_ids = self.read(|state| state.track_ids.clone());
        validate_queue_integrity(&track_ids, &queue_ids, Some(index), None)
            .map_err(|e| QueueError::invalid(e.to_string()))?;

        let window = self.planner().plan(index, queue_ids.len());
        let outcome = self.materialize(&queue_ids, window, index).await;
        let track = self.settle(outcome).await?;

        let track_id = track.id;
        self.update(|state| {
            state.queue_ids = queue_ids;
            state.current_index = Some(index);
            state.duration = track.duration;
            state.current_track = Some(track);
            state.window = window;
            state.position = 0.0;
        });

        info!(index, "Reconciled play order");
        self.emit_queue(QueueEvent::WindowShifted {
            start: window.start,
            end: window.end,
        });
        self.emit_playback(PlaybackEvent::TrackChanged {
            track_id: track_id.get(),
            queue_index: index,
        });
        Ok(())
    }

    /// Propagate an edited song into the cache, the engine and the snapshot.
    ///
    /// Engine updates are best effort. Queue order is never touched.
    #[instrument(skip(self, song), fields(song_id = %song.id))]
    pub async fn update_track_metadata(&self, song: Song) -> Result<()> {
        self.resolver().invalidate(&song);
        self.cache().lock().set(song.id, song.clone());
        let track = self.resolver().resolve(&song).await?;

        let (queue_ids, window) = self.read(|state| (state.queue_ids.clone(), state.window));
        let patch = TrackMetadataPatch::from(&track);
        for index in window.range() {
            if queue_ids.get(index) != Some(&song.id) {
                continue;
            }
            if let Err(e) = self
                .engine()
                .update_metadata(index - window.start, patch.clone())
                .await
            {
                warn!(index, error = %e, "Engine metadata update failed");
            }
        }

        self.update(|state| {
            if state.current_track_id() == Some(song.id) {
                state.duration = track.duration;
                state.current_track = Some(track);
            }
        });
        Ok(())
    }

    /// Apply a notification from the host engine.
    pub async fn handle_engine_event(&self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::ActiveTrackChanged { index } => {
                let _guard = match self.begin_mutation("engine_sync", Activity::Silent) {
                    Ok(guard) => guard,
                    Err(_) => {
                        debug!(?index, "Ignoring active track change during queue mutation");
                        return Ok(());
                    }
                };

                self.sync_locked().await?;
                if let Some(current) = self.read(|state| state.current_index) {
                    let outcome = self.ensure_window_locked(current).await;
                    self.settle(outcome).await?;
                }
                Ok(())
            }
            EngineEvent::Progress {
                position,
                duration,
                buffered,
            } => {
                self.update(|state| {
                    state.position = position;
                    if duration > 0.0 {
                        state.duration = duration;
                    }
                    state.buffered = buffered;
                });
                Ok(())
            }
            EngineEvent::StateChanged(engine_state) => {
                self.update(|state| {
                    state.is_playing = engine_state == EngineState::Playing;
                    state.is_track_loading = engine_state.is_loading();
                });
                Ok(())
            }
            EngineEvent::Error { message } => {
                warn!(%message, "Engine reported an error");
                let track_id = self.read(|state| state.current_track_id());
                self.emit_playback(PlaybackEvent::Error {
                    track_id: track_id.map(|id| id.get()),
                    message,
                    recoverable: true,
                });

                match self.validate_and_repair().await {
                    Ok(_) => Ok(()),
                    Err(QueueError::Busy { .. }) => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}
