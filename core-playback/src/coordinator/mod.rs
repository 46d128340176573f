//! # Queue Coordinator
//!
//! Owns the playback session and keeps the audio engine in step with it.
//!
//! ## Overview
//!
//! The coordinator holds two parallel id sequences:
//! - `track_ids`: session membership in its original order
//! - `queue_ids`: the play order (a permutation of `track_ids` when shuffled)
//!
//! Only a contiguous *window* of the play order is materialized in the engine.
//! Engine index `i` always corresponds to queue index `window.start + i`.
//!
//! ## Workflow
//!
//! Every operation follows the same shape:
//! 1. Take the mutation guard (a second mutation fails fast with `Busy`)
//! 2. Read what it needs from the live state
//! 3. Fetch missing song metadata into the [`SongCache`]
//! 4. Drive the engine and await each command
//! 5. Commit the new state and publish a [`PlayerSnapshot`]
//!
//! State is only committed after the engine has acknowledged the matching
//! commands, so a failed engine call leaves the previous snapshot intact.
//! Errors that mean the model can no longer be trusted
//! ([`QueueError::requires_reset`]) drop the session to idle before returning.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{LoadRequest, PlaySource, QueueCoordinator, QueuePosition};
//!
//! let coordinator = QueueCoordinator::new(engine, songs, resolver, &PlayerConfig::default());
//!
//! coordinator
//!     .load_tracks(LoadRequest::new(ids, 2).with_source(PlaySource::Album, Some("album-9".into())))
//!     .await?;
//! coordinator.play().await?;
//! coordinator.add_to_queue(vec![SongId::new(77)], QueuePosition::Next).await?;
//!
//! let mut snapshots = coordinator.subscribe();
//! while snapshots.changed().await.is_ok() {
//!     render(&snapshots.borrow());
//! }
//! ```

mod editing;
mod load;
mod navigation;
mod restore;
mod shuffle;
mod sync;
mod transport;

pub use load::LoadRequest;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::{AudioEngine, Song, SongId, SongSource, Track};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::config::PlayerConfig;
use crate::engine::EngineDriver;
use crate::error::{QueueError, Result};
use crate::persistence::PersistedQueueState;
use crate::resolver::TrackResolver;
use crate::song_cache::SongCache;
use crate::state::PlayerSnapshot;
use crate::window::{Window, WindowPlanner};

// ============================================================================
// Mutation Guard
// ============================================================================

/// Which loading flag a mutation raises while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activity {
    Queue,
    Shuffle,
    Silent,
}

/// Held for the duration of a queue mutation. Clears the guard on drop.
pub(crate) struct MutationGuard<'a> {
    coordinator: &'a QueueCoordinator,
    activity: Activity,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        let activity = self.activity;
        if activity != Activity::Silent {
            self.coordinator.update(|state| match activity {
                Activity::Queue => state.is_queue_loading = false,
                Activity::Shuffle => state.is_shuffling = false,
                Activity::Silent => {}
            });
        }
        self.coordinator.mutating.store(false, Ordering::Release);
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Playback queue and engine window coordinator.
pub struct QueueCoordinator {
    engine: EngineDriver,
    songs: Arc<dyn SongSource>,
    resolver: Arc<dyn TrackResolver>,
    cache: Mutex<SongCache>,
    state: Mutex<PlayerSnapshot>,
    snapshots: watch::Sender<PlayerSnapshot>,
    events: Option<EventBus>,
    planner: WindowPlanner,
    prefetch_batch: usize,
    mutating: AtomicBool,
    active_operation: Mutex<&'static str>,
}

impl QueueCoordinator {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        songs: Arc<dyn SongSource>,
        resolver: Arc<dyn TrackResolver>,
        config: &PlayerConfig,
    ) -> Self {
        let initial = PlayerSnapshot::new(config.window_size);
        let (snapshots, _) = watch::channel(initial.clone());

        Self {
            engine: EngineDriver::new(engine, config.engine_timeout()),
            songs,
            resolver,
            cache: Mutex::new(SongCache::new(config.window_size)),
            state: Mutex::new(initial),
            snapshots,
            events: None,
            planner: WindowPlanner::from_config(config),
            prefetch_batch: config.prefetch_batch.max(1),
            mutating: AtomicBool::new(false),
            active_operation: Mutex::new(""),
        }
    }

    /// Emit queue and playback events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshots.subscribe()
    }

    /// The minimal projection of the session that survives a restart.
    pub fn persisted_state(&self) -> PersistedQueueState {
        PersistedQueueState::from(&*self.snapshots.borrow())
    }

    /// Whether a queue mutation currently holds the guard.
    pub fn is_busy(&self) -> bool {
        self.mutating.load(Ordering::Acquire)
    }

    /// Number of song entries currently cached.
    pub fn cached_song_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether `id` is pinned in the song cache as part of the live window.
    pub fn is_song_pinned(&self, id: SongId) -> bool {
        self.cache.lock().is_pinned(id)
    }

    // ------------------------------------------------------------------------
    // Internals shared by the operation modules
    // ------------------------------------------------------------------------

    pub(crate) fn begin_mutation(
        &self,
        operation: &'static str,
        activity: Activity,
    ) -> Result<MutationGuard<'_>> {
        if self
            .mutating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let active = *self.active_operation.lock();
            debug!(operation, active, "Rejecting reentrant queue mutation");
            return Err(QueueError::Busy { operation: active });
        }

        *self.active_operation.lock() = operation;
        if activity != Activity::Silent {
            self.update(|state| match activity {
                Activity::Queue => state.is_queue_loading = true,
                Activity::Shuffle => state.is_shuffling = true,
                Activity::Silent => {}
            });
        }

        Ok(MutationGuard {
            coordinator: self,
            activity,
        })
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&PlayerSnapshot) -> R) -> R {
        f(&self.state.lock())
    }

    /// Apply `f` to the live state and publish the result.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut PlayerSnapshot) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        state.refresh_navigation();
        // Published under the lock so snapshots never go backwards
        self.snapshots.send_replace(state.clone());
        result
    }

    pub(crate) fn planner(&self) -> WindowPlanner {
        let window_size = self.read(|state| state.window_size);
        self.planner.with_window_size(window_size)
    }

    pub(crate) fn emit_queue(&self, event: QueueEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Queue(event));
        }
    }

    pub(crate) fn emit_playback(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    /// Songs for `ids` in order, fetching whatever the cache is missing.
    ///
    /// Missing ids are fetched in batches of `prefetch_batch`, then one by one
    /// for anything a batch did not return. All fetched songs land in the cache
    /// in a single bulk update. `priority` ids become the pinned set.
    pub(crate) async fn ensure_cached(
        &self,
        ids: &[SongId],
        priority: Option<&[SongId]>,
    ) -> Result<Vec<Song>> {
        let missing = self.cache.lock().missing(ids);
        let mut fetched: Vec<Song> = Vec::new();

        if !missing.is_empty() {
            debug!(count = missing.len(), "Fetching songs missing from cache");

            for batch in missing.chunks(self.prefetch_batch) {
                match self.songs.prefetch_songs(batch).await {
                    Ok(songs) => fetched.extend(songs),
                    Err(e) => warn!(batch = batch.len(), error = %e, "Batched song fetch failed"),
                }
            }

            let found: HashSet<SongId> = fetched.iter().map(|song| song.id).collect();
            for id in missing.iter().filter(|id| !found.contains(id)) {
                match self.songs.fetch_song(*id).await {
                    Ok(Some(song)) => fetched.push(song),
                    Ok(None) => debug!(song_id = %id, "Song not found in library"),
                    Err(e) => warn!(song_id = %id, error = %e, "Song fetch failed"),
                }
            }
        }

        let mut cache = self.cache.lock();
        if !fetched.is_empty() || priority.is_some() {
            // Requested songs already cached ride along so the update keeps them
            let mut batch: HashSet<SongId> = fetched.iter().map(|song| song.id).collect();
            let cached: Vec<Song> = ids
                .iter()
                .filter(|id| batch.insert(**id))
                .filter_map(|id| cache.peek(*id).cloned())
                .collect();
            fetched.extend(cached);
            cache.bulk_update(fetched, priority);
        }

        let mut songs = Vec::with_capacity(ids.len());
        let mut unresolved = Vec::new();
        for id in ids {
            match cache.get(*id) {
                Some(song) => songs.push(song),
                None => unresolved.push(*id),
            }
        }

        if unresolved.is_empty() {
            Ok(songs)
        } else {
            unresolved.dedup();
            Err(QueueError::CacheConsistency {
                missing: unresolved,
            })
        }
    }

    pub(crate) async fn resolve_tracks(&self, songs: &[Song]) -> Result<Vec<Track>> {
        let mut tracks = Vec::with_capacity(songs.len());
        for song in songs {
            tracks.push(self.resolver.resolve(song).await?);
        }
        Ok(tracks)
    }

    /// Fetch and resolve the songs of `window` and load them into the engine,
    /// positioned on `current`. Returns the current track.
    pub(crate) async fn materialize(
        &self,
        queue_ids: &[SongId],
        window: Window,
        current: usize,
    ) -> Result<Track> {
        let Some(player_index) = window.player_index(current) else {
            return Err(QueueError::Integrity(format!(
                "window {:?} excludes anchor index {}",
                window, current
            )));
        };
        if window.end > queue_ids.len() {
            return Err(QueueError::Integrity(format!(
                "window {:?} exceeds queue of {} entries",
                window,
                queue_ids.len()
            )));
        }

        let window_ids = &queue_ids[window.range()];
        let songs = self.ensure_cached(window_ids, Some(window_ids)).await?;
        let tracks = self.resolve_tracks(&songs).await?;
        let current_track = tracks[player_index].clone();

        self.engine.reset().await?;
        let filled = async {
            self.engine.add(tracks, None).await?;
            self.engine.skip(player_index).await
        }
        .await;

        // The previous window is gone from the engine, so the old state is too
        if let Err(e) = filled {
            error!(error = %e, "Engine rejected new window, resetting to idle");
            self.reset_to_idle().await;
            return Err(e);
        }

        debug!(
            start = window.start,
            end = window.end,
            player_index,
            "Materialized engine window"
        );
        Ok(current_track)
    }

    /// Pin exactly the songs of the committed window.
    pub(crate) fn repin_live_window(&self) {
        let window_ids = self.read(|state| {
            state
                .queue_ids
                .get(state.window.range())
                .map(<[SongId]>::to_vec)
                .unwrap_or_default()
        });
        self.cache.lock().pin(&window_ids);
    }

    /// Drop the session (settings survive) and empty the engine.
    pub(crate) async fn reset_to_idle(&self) {
        if let Err(e) = self.engine.reset().await {
            warn!(error = %e, "Engine reset failed while clearing queue");
        }

        let window_size = self.update(|state| {
            state.clear_session();
            state.window_size
        });
        self.cache.lock().clear(window_size);
        self.emit_queue(QueueEvent::Cleared);
    }

    /// Pass `outcome` through, dropping to idle first when it carries an error
    /// the model cannot recover from.
    pub(crate) async fn settle<T>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Err(e) if e.requires_reset() => {
                error!(error = %e, "Queue state unrecoverable, resetting to idle");
                self.reset_to_idle().await;
                Err(e)
            }
            other => other,
        }
    }

    pub(crate) fn cache(&self) -> &Mutex<SongCache> {
        &self.cache
    }

    pub(crate) fn engine(&self) -> &EngineDriver {
        &self.engine
    }

    pub(crate) fn resolver(&self) -> &dyn TrackResolver {
        self.resolver.as_ref()
    }
}

impl std::fmt::Debug for QueueCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("QueueCoordinator")
            .field("queue_len", &state.queue_ids.len())
            .field("current_index", &state.current_index)
            .field("window", &state.window)
            .field("busy", &self.is_busy())
            .finish()
    }
}
