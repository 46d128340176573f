//! Recording fakes shared by the coordinator integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioEngine, BridgeError, MediaLocator, RepeatMode, Song, SongId, SongSource, Track,
    TrackMetadataPatch,
};
use core_playback::{
    validate_queue_integrity, LibraryTrackResolver, PlayerConfig, QueueCoordinator,
};
use core_runtime::events::EventBus;

pub fn ids(values: &[i64]) -> Vec<SongId> {
    values.iter().copied().map(SongId::new).collect()
}

pub fn song(id: i64) -> Song {
    Song {
        id: SongId::new(id),
        name: format!("Song {}", id),
        file_path: format!("/music/{}.mp3", id),
        thumbnail_path: None,
        artists: Vec::new(),
        album: None,
        duration: 180.0 + id as f64,
        is_favorite: false,
        play_count: 0,
        last_played_at: None,
    }
}

/// Small window so tests exercise shifting and extension.
pub fn small_config() -> PlayerConfig {
    PlayerConfig {
        window_size: 4,
        lookahead_margin: 1,
        extension_batch: 2,
        prefetch_batch: 3,
        ..PlayerConfig::default()
    }
}

// ============================================================================
// Fake Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Reset,
    Add { count: usize, at: Option<usize> },
    Remove(usize),
    Move(usize, usize),
    Skip(usize),
    Play,
    Pause,
    Stop,
    Retry,
    SeekTo(f64),
    SeekBy(f64),
    SetVolume(f32),
    SetRepeatMode(RepeatMode),
    UpdateMetadata(usize),
}

#[derive(Debug, Default)]
pub struct FakeEngineState {
    pub queue: Vec<Track>,
    pub active: Option<usize>,
    pub calls: Vec<EngineCall>,
    pub volume: f32,
    pub fail_on: HashSet<&'static str>,
}

/// In-memory engine that behaves like a real player queue and records calls.
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub state: Arc<Mutex<FakeEngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_ids(&self) -> Vec<SongId> {
        self.state.lock().unwrap().queue.iter().map(|t| t.id).collect()
    }

    pub fn active(&self) -> Option<usize> {
        self.state.lock().unwrap().active
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().fail_on.insert(operation);
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().fail_on.clear();
    }

    /// Pretend the engine moved on by itself (track finished, remote control).
    pub fn set_active(&self, index: usize) {
        self.state.lock().unwrap().active = Some(index);
    }

    fn record(&self, operation: &'static str, call: EngineCall) -> BridgeResult<std::sync::MutexGuard<'_, FakeEngineState>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on.contains(operation) {
            return Err(BridgeError::OperationFailed(format!("{} rejected", operation)));
        }
        state.calls.push(call);
        Ok(state)
    }
}

fn out_of_range(index: usize, len: usize) -> BridgeError {
    BridgeError::OperationFailed(format!("index {} out of range for {}", index, len))
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn reset(&self) -> BridgeResult<()> {
        let mut state = self.record("reset", EngineCall::Reset)?;
        state.queue.clear();
        state.active = None;
        Ok(())
    }

    async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> BridgeResult<()> {
        let mut state = self.record(
            "add",
            EngineCall::Add {
                count: tracks.len(),
                at: at_index,
            },
        )?;
        let len = state.queue.len();
        let at = at_index.unwrap_or(len);
        if at > len {
            return Err(out_of_range(at, len));
        }

        let count = tracks.len();
        state.queue.splice(at..at, tracks);
        state.active = match state.active {
            Some(active) if at <= active => Some(active + count),
            Some(active) => Some(active),
            None if !state.queue.is_empty() => Some(0),
            None => None,
        };
        Ok(())
    }

    async fn remove(&self, index: usize) -> BridgeResult<()> {
        let mut state = self.record("remove", EngineCall::Remove(index))?;
        let len = state.queue.len();
        if index >= len {
            return Err(out_of_range(index, len));
        }

        state.queue.remove(index);
        let len = state.queue.len();
        state.active = match state.active {
            _ if len == 0 => None,
            Some(active) if index < active => Some(active - 1),
            Some(active) => Some(active.min(len - 1)),
            None => None,
        };
        Ok(())
    }

    async fn move_track(&self, from: usize, to: usize) -> BridgeResult<()> {
        let mut state = self.record("move", EngineCall::Move(from, to))?;
        let len = state.queue.len();
        if from >= len || to >= len {
            return Err(out_of_range(from.max(to), len));
        }

        let active_id = state.active.map(|a| state.queue[a].id);
        let track = state.queue.remove(from);
        state.queue.insert(to, track);
        if let Some(active) = state.active {
            state.active = Some(if active == from {
                to
            } else {
                let without = if active > from { active - 1 } else { active };
                if without >= to {
                    without + 1
                } else {
                    without
                }
            });
        }
        debug_assert_eq!(active_id, state.active.map(|a| state.queue[a].id));
        Ok(())
    }

    async fn skip(&self, index: usize) -> BridgeResult<()> {
        let mut state = self.record("skip", EngineCall::Skip(index))?;
        let len = state.queue.len();
        if index >= len {
            return Err(out_of_range(index, len));
        }
        state.active = Some(index);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record("play", EngineCall::Play).map(|_| ())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record("pause", EngineCall::Pause).map(|_| ())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record("stop", EngineCall::Stop).map(|_| ())
    }

    async fn retry(&self) -> BridgeResult<()> {
        self.record("retry", EngineCall::Retry).map(|_| ())
    }

    async fn seek_to(&self, position: f64) -> BridgeResult<()> {
        self.record("seek_to", EngineCall::SeekTo(position)).map(|_| ())
    }

    async fn seek_by(&self, delta: f64) -> BridgeResult<()> {
        self.record("seek_by", EngineCall::SeekBy(delta)).map(|_| ())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        let mut state = self.record("set_volume", EngineCall::SetVolume(volume))?;
        state.volume = volume;
        Ok(())
    }

    async fn set_repeat_mode(&self, mode: RepeatMode) -> BridgeResult<()> {
        self.record("set_repeat_mode", EngineCall::SetRepeatMode(mode))
            .map(|_| ())
    }

    async fn get_queue(&self) -> BridgeResult<Vec<Track>> {
        Ok(self.state.lock().unwrap().queue.clone())
    }

    async fn get_active_index(&self) -> BridgeResult<Option<usize>> {
        Ok(self.state.lock().unwrap().active)
    }

    async fn update_metadata_for_track(
        &self,
        index: usize,
        patch: TrackMetadataPatch,
    ) -> BridgeResult<()> {
        let mut state = self.record("update_metadata", EngineCall::UpdateMetadata(index))?;
        let len = state.queue.len();
        let track = state
            .queue
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        if let Some(title) = patch.title {
            track.title = title;
        }
        if let Some(artist) = patch.artist {
            track.artist = artist;
        }
        Ok(())
    }
}

// ============================================================================
// Fake Library
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeLibraryState {
    pub songs: HashMap<SongId, Song>,
    pub prefetch_calls: Vec<Vec<SongId>>,
    pub fetch_calls: Vec<SongId>,
    pub fail_prefetch: bool,
}

#[derive(Clone, Default)]
pub struct FakeLibrary {
    pub state: Arc<Mutex<FakeLibraryState>>,
}

impl FakeLibrary {
    pub fn with_songs(values: impl IntoIterator<Item = i64>) -> Self {
        let library = Self::default();
        for id in values {
            library.insert(song(id));
        }
        library
    }

    pub fn insert(&self, song: Song) {
        self.state.lock().unwrap().songs.insert(song.id, song);
    }

    pub fn forget(&self, id: i64) {
        self.state.lock().unwrap().songs.remove(&SongId::new(id));
    }

    pub fn fail_prefetch(&self) {
        self.state.lock().unwrap().fail_prefetch = true;
    }

    pub fn prefetch_calls(&self) -> Vec<Vec<SongId>> {
        self.state.lock().unwrap().prefetch_calls.clone()
    }

    pub fn fetch_calls(&self) -> Vec<SongId> {
        self.state.lock().unwrap().fetch_calls.clone()
    }
}

#[async_trait]
impl SongSource for FakeLibrary {
    async fn fetch_song(&self, id: SongId) -> BridgeResult<Option<Song>> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls.push(id);
        Ok(state.songs.get(&id).cloned())
    }

    async fn prefetch_songs(&self, ids: &[SongId]) -> BridgeResult<Vec<Song>> {
        let mut state = self.state.lock().unwrap();
        state.prefetch_calls.push(ids.to_vec());
        if state.fail_prefetch {
            return Err(BridgeError::OperationFailed("library offline".into()));
        }
        Ok(ids.iter().filter_map(|id| state.songs.get(id).cloned()).collect())
    }
}

/// Library whose batched fetch blocks until released, to hold a mutation open.
#[derive(Clone)]
pub struct GatedLibrary {
    pub inner: FakeLibrary,
    pub gate: Arc<tokio::sync::Notify>,
}

impl GatedLibrary {
    pub fn new(inner: FakeLibrary) -> Self {
        Self {
            inner,
            gate: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl SongSource for GatedLibrary {
    async fn fetch_song(&self, id: SongId) -> BridgeResult<Option<Song>> {
        self.inner.fetch_song(id).await
    }

    async fn prefetch_songs(&self, ids: &[SongId]) -> BridgeResult<Vec<Song>> {
        self.gate.notified().await;
        self.inner.prefetch_songs(ids).await
    }
}

pub struct FakeLocator;

#[async_trait]
impl MediaLocator for FakeLocator {
    async fn file_url(&self, file_path: &str) -> BridgeResult<String> {
        Ok(format!("file://{}", file_path))
    }

    async fn artwork_url(&self, thumbnail_path: &str) -> BridgeResult<String> {
        Ok(format!("art://{}", thumbnail_path))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub coordinator: Arc<QueueCoordinator>,
    pub engine: FakeEngine,
    pub library: FakeLibrary,
    pub events: EventBus,
}

pub fn harness(library_ids: impl IntoIterator<Item = i64>, config: PlayerConfig) -> Harness {
    let library = FakeLibrary::with_songs(library_ids);
    harness_with_source(library.clone(), Arc::new(library), config)
}

/// Harness whose coordinator fetches through `source` instead of `library`.
pub fn harness_with_source(
    library: FakeLibrary,
    source: Arc<dyn SongSource>,
    config: PlayerConfig,
) -> Harness {
    let engine = FakeEngine::new();
    let events = EventBus::new(256);
    let resolver = Arc::new(LibraryTrackResolver::new(
        Arc::new(FakeLocator),
        config.track_url_cache_size,
        None,
    ));

    let coordinator = QueueCoordinator::new(Arc::new(engine.clone()), source, resolver, &config)
    .with_event_bus(events.clone());

    Harness {
        coordinator: Arc::new(coordinator),
        engine,
        library,
        events,
    }
}

impl Harness {
    /// Asserts every queue invariant plus agreement with the engine.
    pub fn assert_consistent(&self) {
        let snapshot = self.coordinator.snapshot();

        validate_queue_integrity(
            &snapshot.track_ids,
            &snapshot.queue_ids,
            snapshot.current_index,
            snapshot.current_track_id(),
        )
        .expect("queue integrity");

        assert!(!snapshot.is_queue_loading, "queue guard left raised");
        assert!(!snapshot.is_shuffling, "shuffle guard left raised");
        assert!(!self.coordinator.is_busy());

        match snapshot.current_index {
            None => {
                assert!(snapshot.queue_ids.is_empty());
                assert!(snapshot.current_track.is_none());
                assert!(self.engine.queue_ids().is_empty());
            }
            Some(current) => {
                let current_id = snapshot.queue_ids[current];
                let track = snapshot.current_track.as_ref().expect("current track");
                assert_eq!(track.id, current_id, "current track disagrees with index");

                let window = snapshot.window;
                assert!(window.contains(current), "{current} outside {window:?}");
                assert_eq!(
                    self.engine.queue_ids(),
                    snapshot.queue_ids[window.range()].to_vec(),
                    "engine queue differs from window"
                );
                assert_eq!(self.engine.active(), Some(current - window.start));
            }
        }
    }
}
