//! Queue editing: insert, remove, move and clear.

use bridge_traits::{SongId, Track};
use core_runtime::events::{PlaybackEvent, QueueEvent};
use tracing::{debug, error, info, instrument, warn};

use super::{Activity, LoadRequest, QueueCoordinator};
use crate::error::{QueueError, Result};
use crate::state::{PlaySource, QueuePosition};
use crate::window::Window;

/// Index of the entry at `index` after moving `from` to `to`.
fn index_after_move(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        return to;
    }
    let without = if index > from { index - 1 } else { index };
    if without >= to {
        without + 1
    } else {
        without
    }
}

impl QueueCoordinator {
    /// Insert `ids` right after the current track or at the tail.
    ///
    /// The engine only learns about the new ids when the insertion point lies
    /// inside the materialized window. An empty queue is loaded from `ids`.
    #[instrument(skip(self, ids), fields(count = ids.len(), position = ?position))]
    pub async fn add_to_queue(&self, ids: Vec<SongId>, position: QueuePosition) -> Result<()> {
        if ids.is_empty() {
            return Err(QueueError::invalid("no song ids to add"));
        }

        let _guard = self.begin_mutation("add", Activity::Queue)?;
        let outcome = self.add_locked(ids, position).await;
        self.settle(outcome).await
    }

    /// Shorthand for `add_to_queue(ids, QueuePosition::Next)`.
    pub async fn add_after_current(&self, ids: Vec<SongId>) -> Result<()> {
        self.add_to_queue(ids, QueuePosition::Next).await
    }

    async fn add_locked(&self, ids: Vec<SongId>, position: QueuePosition) -> Result<()> {
        let (idle, source, context_id) = self.read(|state| {
            (
                state.is_idle(),
                state.play_source,
                state.source_context_id.clone(),
            )
        });

        if idle {
            debug!("Queue empty, loading added ids as a new session");
            let source = if source == PlaySource::Unknown {
                PlaySource::Queue
            } else {
                source
            };
            return self
                .load_locked(LoadRequest::new(ids, 0).with_source(source, context_id))
                .await;
        }

        // Unknown ids are the caller's problem, not a broken model
        let songs = match self.ensure_cached(&ids, None).await {
            Ok(songs) => songs,
            Err(QueueError::CacheConsistency { missing }) => {
                return Err(QueueError::invalid(format!(
                    "unknown song ids: {:?}",
                    missing
                )));
            }
            Err(e) => return Err(e),
        };

        let (track_ids, current, window, shuffled, len) = self.read(|state| {
            (
                state.track_ids.clone(),
                state.current_index.unwrap_or(0),
                state.window,
                state.shuffle_enabled,
                state.queue_ids.len(),
            )
        });
        let current_id = self.read(|state| state.current_track_id());

        let insert_at = match position {
            QueuePosition::Next => current + 1,
            QueuePosition::End => len,
        };
        let track_insert = match (shuffled, position) {
            (false, _) => insert_at.min(track_ids.len()),
            (true, QueuePosition::Next) => current_id
                .and_then(|id| track_ids.iter().position(|t| *t == id))
                .map(|index| index + 1)
                .unwrap_or(track_ids.len()),
            (true, QueuePosition::End) => track_ids.len(),
        };

        let count = ids.len();
        let touches_engine = window.start <= insert_at && insert_at <= window.end;
        if touches_engine {
            let tracks = self.resolve_tracks(&songs).await?;
            self.engine()
                .add(tracks, Some(insert_at - window.start))
                .await?;
        }

        self.update(|state| {
            state
                .queue_ids
                .splice(insert_at..insert_at, ids.iter().copied());
            state
                .track_ids
                .splice(track_insert..track_insert, ids.iter().copied());

            state.window = if touches_engine {
                Window::new(window.start, window.end + count)
            } else if insert_at < window.start {
                Window::new(window.start + count, window.end + count)
            } else {
                window
            };
        });

        info!(count, insert_at, touches_engine, "Added tracks to queue");
        self.emit_queue(QueueEvent::TracksAdded {
            count,
            at_index: insert_at,
        });

        Ok(())
    }

    /// Remove the entry at `index` of the play order.
    #[instrument(skip(self))]
    pub async fn remove_from_queue(&self, index: usize) -> Result<()> {
        let _guard = self.begin_mutation("remove", Activity::Queue)?;
        let outcome = self.remove_locked(index).await;
        self.settle(outcome).await
    }

    /// Remove every occurrence of `id`. Returns how many entries were removed.
    #[instrument(skip(self), fields(song_id = %id))]
    pub async fn remove_song_by_id(&self, id: SongId) -> Result<usize> {
        let _guard = self.begin_mutation("remove", Activity::Queue)?;

        let positions: Vec<usize> = self.read(|state| {
            state
                .queue_ids
                .iter()
                .enumerate()
                .filter(|(_, queued)| **queued == id)
                .map(|(index, _)| index)
                .collect()
        });

        if positions.is_empty() {
            debug!("Song not in queue");
            return Ok(0);
        }

        for index in positions.iter().rev() {
            let outcome = self.remove_locked(*index).await;
            self.settle(outcome).await?;
        }
        Ok(positions.len())
    }

    async fn remove_locked(&self, index: usize) -> Result<()> {
        let (queue_ids, track_ids, current, window, shuffled) = self.read(|state| {
            (
                state.queue_ids.clone(),
                state.track_ids.clone(),
                state.current_index,
                state.window,
                state.shuffle_enabled,
            )
        });

        if index >= queue_ids.len() {
            return Err(QueueError::invalid(format!(
                "index {} out of range for {} entries",
                index,
                queue_ids.len()
            )));
        }
        let current = current.unwrap_or(0);
        let removed_id = queue_ids[index];

        if let Some(player_index) = window.player_index(index) {
            self.engine().remove(player_index).await?;
        }

        let mut next_queue = queue_ids;
        next_queue.remove(index);
        let mut next_tracks = track_ids;
        let track_index = if shuffled {
            next_tracks.iter().position(|id| *id == removed_id)
        } else {
            Some(index)
        };
        if let Some(track_index) = track_index.filter(|i| *i < next_tracks.len()) {
            next_tracks.remove(track_index);
        }

        self.emit_queue(QueueEvent::TrackRemoved {
            track_id: removed_id.get(),
            index,
        });

        if next_queue.is_empty() {
            info!("Removed last entry, queue is now empty");
            self.reset_to_idle().await;
            return Ok(());
        }

        let next_window = if window.contains(index) {
            Window::new(window.start, window.end - 1)
        } else if index < window.start {
            Window::new(window.start - 1, window.end - 1)
        } else {
            window
        };

        if index != current {
            let next_current = if index < current { current - 1 } else { current };
            self.update(|state| {
                state.queue_ids = next_queue;
                state.track_ids = next_tracks;
                state.current_index = Some(next_current);
                state.window = next_window;
            });
            debug!(index, current = next_current, "Removed queued entry");
            return Ok(());
        }

        // The current entry went away: its successor (or the new tail) plays
        let replacement = current.min(next_queue.len() - 1);
        let replaced: Result<(Track, Window)> = async {
            match next_window.player_index(replacement) {
                Some(player_index) => {
                    let songs = self
                        .ensure_cached(&next_queue[replacement..=replacement], None)
                        .await?;
                    let track = self.resolver().resolve(&songs[0]).await?;
                    self.engine().skip(player_index).await?;
                    Ok((track, next_window))
                }
                None => {
                    let window = self.planner().plan(replacement, next_queue.len());
                    let track = self.materialize(&next_queue, window, replacement).await?;
                    Ok((track, window))
                }
            }
        }
        .await;
        // The engine already dropped the entry, so the old state is gone too
        let (track, window) = match replaced {
            Ok(replaced) => replaced,
            Err(e) => {
                error!(error = %e, index, "Could not start replacement track, resetting to idle");
                self.reset_to_idle().await;
                return Err(e);
            }
        };

        let track_id = track.id;
        self.update(|state| {
            state.queue_ids = next_queue;
            state.track_ids = next_tracks;
            state.current_index = Some(replacement);
            state.duration = track.duration;
            state.current_track = Some(track);
            state.window = window;
            state.position = 0.0;
            state.buffered = 0.0;
        });

        info!(index, replacement, "Removed current entry");
        self.emit_playback(PlaybackEvent::TrackChanged {
            track_id: track_id.get(),
            queue_index: replacement,
        });

        Ok(())
    }

    /// Move the entry at `from` to `to` in the play order.
    ///
    /// Moves inside the window are mirrored into the engine. A move that
    /// carries an entry across the window edge removes it from, or adds it
    /// to, the engine so the window stays contiguous.
    #[instrument(skip(self))]
    pub async fn move_in_queue(&self, from: usize, to: usize) -> Result<()> {
        let _guard = self.begin_mutation("move", Activity::Queue)?;
        let outcome = self.move_locked(from, to).await;
        self.settle(outcome).await
    }

    async fn move_locked(&self, from: usize, to: usize) -> Result<()> {
        let (mut queue_ids, mut track_ids, current, window, shuffled) = self.read(|state| {
            (
                state.queue_ids.clone(),
                state.track_ids.clone(),
                state.current_index,
                state.window,
                state.shuffle_enabled,
            )
        });

        let len = queue_ids.len();
        if from >= len || to >= len {
            return Err(QueueError::invalid(format!(
                "move {} -> {} out of range for {} entries",
                from, to, len
            )));
        }
        if from == to {
            return Ok(());
        }

        let current = current.unwrap_or(0);
        let moved_id = queue_ids.remove(from);
        queue_ids.insert(to, moved_id);
        if !shuffled {
            let id = track_ids.remove(from);
            track_ids.insert(to, id);
        }
        let next_current = index_after_move(current, from, to);

        let mut replaced_track: Option<Track> = None;
        let next_window = match (window.player_index(from), window.contains(to)) {
            (Some(player_from), true) => {
                self.engine()
                    .move_track(player_from, to - window.start)
                    .await?;
                window
            }
            (None, false) => {
                if window.is_empty() {
                    window
                } else {
                    let start = index_after_move(window.start, from, to);
                    let last = index_after_move(window.end - 1, from, to);
                    Window::new(start, last + 1)
                }
            }
            (Some(player_from), false) => {
                self.engine().remove(player_from).await?;
                let start = if to < window.start {
                    window.start + 1
                } else {
                    window.start
                };
                let shrunk = Window::new(start, start + window.len() - 1);

                if shrunk.contains(next_current) {
                    shrunk
                } else {
                    // The current entry left the window with the move
                    let planned = self.planner().plan(next_current, len);
                    replaced_track = Some(self.materialize(&queue_ids, planned, next_current).await?);
                    planned
                }
            }
            (None, true) => {
                // Nothing changed yet: a song that cannot load rejects the move
                let track = match self.ensure_cached(&[moved_id], None).await {
                    Ok(songs) => self.resolver().resolve(&songs[0]).await,
                    Err(e) => Err(e),
                };
                let track = match track {
                    Ok(track) => track,
                    Err(QueueError::CacheConsistency { missing }) => {
                        return Err(QueueError::invalid(format!(
                            "cannot move unloadable songs {:?} into the window",
                            missing
                        )));
                    }
                    Err(e) => return Err(e),
                };
                let start = if from < window.start {
                    window.start - 1
                } else {
                    window.start
                };
                self.engine().add(vec![track], Some(to - start)).await?;
                Window::new(start, start + window.len() + 1)
            }
        };

        self.update(|state| {
            state.queue_ids = queue_ids;
            state.track_ids = track_ids;
            state.current_index = Some(next_current);
            state.window = next_window;
            if let Some(track) = replaced_track {
                state.duration = track.duration;
                state.current_track = Some(track);
                state.position = 0.0;
            }
        });

        debug!(from, to, current = next_current, "Moved queue entry");
        self.emit_queue(QueueEvent::TrackMoved { from, to });

        Ok(())
    }

    /// Empty the queue and the engine. Settings are kept.
    #[instrument(skip(self))]
    pub async fn clear_queue(&self) -> Result<()> {
        let _guard = self.begin_mutation("clear", Activity::Queue)?;
        self.reset_to_idle().await;
        info!("Cleared queue");
        Ok(())
    }

    /// Stop playback, clear the queue and forget where the session came from.
    #[instrument(skip(self))]
    pub async fn destroy(&self) -> Result<()> {
        let _guard = self.begin_mutation("destroy", Activity::Queue)?;

        if let Err(e) = self.engine().stop().await {
            warn!(error = %e, "Engine stop failed during teardown");
        }
        self.reset_to_idle().await;
        self.update(|state| {
            state.play_source = PlaySource::Unknown;
            state.source_context_id = None;
        });

        info!("Destroyed playback session");
        self.emit_playback(PlaybackEvent::Stopped);
        Ok(())
    }
}
