//! Track navigation and window maintenance.

use bridge_traits::RepeatMode;
use core_runtime::events::{PlaybackEvent, QueueEvent};
use tracing::{debug, info, instrument, warn};

use super::{Activity, QueueCoordinator};
use crate::error::{QueueError, Result};
use crate::window::Window;

impl QueueCoordinator {
    /// Make `index` the current track.
    ///
    /// Inside the window this is an engine skip. Outside it the window is
    /// rebuilt around `index` first.
    #[instrument(skip(self))]
    pub async fn skip_to_track(&self, index: usize) -> Result<()> {
        let _guard = self.begin_mutation("skip", Activity::Silent)?;
        let outcome = self.skip_locked(index).await;
        self.settle(outcome).await
    }

    /// Advance to the next track and play it. Wraps under `RepeatMode::Queue`.
    pub async fn play_next(&self) -> Result<()> {
        let (current, len, repeat) =
            self.read(|state| (state.current_index, state.queue_len(), state.repeat_mode));
        let Some(current) = current else {
            return Ok(());
        };

        let next = if current + 1 < len {
            current + 1
        } else if repeat == RepeatMode::Queue {
            0
        } else {
            debug!("Already at the last track");
            return Ok(());
        };

        self.skip_to_track(next).await?;
        self.play().await
    }

    /// Step back to the previous track and play it. Wraps under
    /// `RepeatMode::Queue`.
    pub async fn play_previous(&self) -> Result<()> {
        let (current, len, repeat) =
            self.read(|state| (state.current_index, state.queue_len(), state.repeat_mode));
        let Some(current) = current else {
            return Ok(());
        };

        let previous = if current > 0 {
            current - 1
        } else if repeat == RepeatMode::Queue {
            len - 1
        } else {
            debug!("Already at the first track");
            return Ok(());
        };

        self.skip_to_track(previous).await?;
        self.play().await
    }

    /// Make sure `index` is materialized in the engine.
    ///
    /// A no-op when it already is, unless it sits within the lookahead margin
    /// of the trailing edge: then the next batch is appended without a reset.
    #[instrument(skip(self))]
    pub async fn ensure_window_for_index(&self, index: usize) -> Result<()> {
        let _guard = self.begin_mutation("ensure_window", Activity::Silent)?;
        let outcome = self.ensure_window_locked(index).await;
        self.settle(outcome).await
    }

    pub(crate) async fn skip_locked(&self, index: usize) -> Result<()> {
        let (queue_ids, window) = self.read(|state| (state.queue_ids.clone(), state.window));
        if index >= queue_ids.len() {
            return Err(QueueError::invalid(format!(
                "index {} out of range for {} entries",
                index,
                queue_ids.len()
            )));
        }

        let Some(player_index) = window.player_index(index) else {
            return self.shift_window(index).await;
        };

        let songs = self
            .ensure_cached(&queue_ids[index..=index], None)
            .await?;
        let track = self.resolver().resolve(&songs[0]).await?;
        self.engine().skip(player_index).await?;

        let track_id = track.id;
        self.update(|state| {
            state.current_index = Some(index);
            state.duration = track.duration;
            state.current_track = Some(track);
            state.position = 0.0;
            state.buffered = 0.0;
        });
        self.emit_playback(PlaybackEvent::TrackChanged {
            track_id: track_id.get(),
            queue_index: index,
        });

        self.extend_if_needed(index).await;
        Ok(())
    }

    pub(crate) async fn ensure_window_locked(&self, index: usize) -> Result<()> {
        let (len, window) = self.read(|state| (state.queue_len(), state.window));
        if len == 0 {
            return Ok(());
        }
        if index >= len {
            return Err(QueueError::invalid(format!(
                "index {} out of range for {} entries",
                index, len
            )));
        }

        if !window.contains(index) {
            return self.shift_window(index).await;
        }

        self.extend_if_needed(index).await;
        Ok(())
    }

    /// Rebuild the engine window around `index` and make it current.
    async fn shift_window(&self, index: usize) -> Result<()> {
        let queue_ids = self.read(|state| state.queue_ids.clone());
        let window = self.planner().plan(index, queue_ids.len());
        let track = self.materialize(&queue_ids, window, index).await?;

        let track_id = track.id;
        self.update(|state| {
            state.current_index = Some(index);
            state.duration = track.duration;
            state.current_track = Some(track);
            state.window = window;
            state.position = 0.0;
            state.buffered = 0.0;
        });

        info!(
            index,
            start = window.start,
            end = window.end,
            "Shifted playback window"
        );
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

    /// Append the next batch when `index` is close to the trailing edge.
    ///
    /// Failures are logged; the current window stays valid without the batch.
    async fn extend_if_needed(&self, index: usize) {
        let (queue_ids, window) = self.read(|state| (state.queue_ids.clone(), state.window));
        let planner = self.planner();
        if !planner.needs_extension(window, index, queue_ids.len()) {
            return;
        }

        let added = planner.extension(window, queue_ids.len());
        let grown = Window::new(window.start, added.end);

        let result: Result<()> = async {
            let pinned = &queue_ids[grown.range()];
            let songs = self
                .ensure_cached(&queue_ids[added.clone()], Some(pinned))
                .await?;
            let tracks = self.resolve_tracks(&songs).await?;
            self.engine().add(tracks, None).await
        }
        .await;

        match result {
            Ok(()) => {
                self.update(|state| state.window = grown);
                debug!(
                    start = grown.start,
                    end = grown.end,
                    "Extended playback window"
                );
                self.emit_queue(QueueEvent::WindowExtended {
                    start: grown.start,
                    end: grown.end,
                });
            }
            Err(e) => warn!(error = %e, index, "Window extension failed"),
        }
    }
}
