//! Minimal in-memory bridges for driving the service end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::InMemorySettingsStore;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioEngine, MediaLocator, RepeatMode, SettingsStore, Song, SongId, SongSource, Track,
    TrackMetadataPatch,
};
use core_service::{CoreConfig, FeatureFlags};

pub fn ids(values: &[i64]) -> Vec<SongId> {
    values.iter().copied().map(SongId::new).collect()
}

#[derive(Debug, Default)]
pub struct EngineState {
    pub queue: Vec<Track>,
    pub active: Option<usize>,
    pub volume: f32,
    pub playing: bool,
}

/// Engine that only keeps its queue, active entry and volume.
#[derive(Clone, Default)]
pub struct QueueEngine {
    pub state: Arc<Mutex<EngineState>>,
}

impl QueueEngine {
    pub fn queue_ids(&self) -> Vec<SongId> {
        self.state.lock().unwrap().queue.iter().map(|t| t.id).collect()
    }

    pub fn active(&self) -> Option<usize> {
        self.state.lock().unwrap().active
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }
}

#[async_trait]
impl AudioEngine for QueueEngine {
    async fn reset(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.queue.clear();
        state.active = None;
        Ok(())
    }

    async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        let at = at_index.unwrap_or(state.queue.len()).min(state.queue.len());
        let count = tracks.len();
        state.queue.splice(at..at, tracks);
        state.active = match state.active {
            Some(active) if at <= active => Some(active + count),
            None if !state.queue.is_empty() => Some(0),
            other => other,
        };
        Ok(())
    }

    async fn remove(&self, index: usize) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
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
        let mut state = self.state.lock().unwrap();
        let track = state.queue.remove(from);
        state.queue.insert(to, track);
        Ok(())
    }

    async fn skip(&self, index: usize) -> BridgeResult<()> {
        self.state.lock().unwrap().active = Some(index);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.state.lock().unwrap().playing = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.state.lock().unwrap().playing = false;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.state.lock().unwrap().playing = false;
        Ok(())
    }

    async fn retry(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek_to(&self, _position: f64) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek_by(&self, _delta: f64) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.state.lock().unwrap().volume = volume;
        Ok(())
    }

    async fn set_repeat_mode(&self, _mode: RepeatMode) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_queue(&self) -> BridgeResult<Vec<Track>> {
        Ok(self.state.lock().unwrap().queue.clone())
    }

    async fn get_active_index(&self) -> BridgeResult<Option<usize>> {
        Ok(self.state.lock().unwrap().active)
    }

    async fn update_metadata_for_track(
        &self,
        _index: usize,
        _patch: TrackMetadataPatch,
    ) -> BridgeResult<()> {
        Ok(())
    }
}

pub struct Library {
    songs: HashMap<SongId, Song>,
}

impl Library {
    pub fn with_songs(values: impl IntoIterator<Item = i64>) -> Self {
        let songs = values
            .into_iter()
            .map(|id| {
                let song = Song {
                    id: SongId::new(id),
                    name: format!("Song {}", id),
                    file_path: format!("/music/{}.flac", id),
                    thumbnail_path: None,
                    artists: Vec::new(),
                    album: None,
                    duration: 200.0,
                    is_favorite: false,
                    play_count: 0,
                    last_played_at: None,
                };
                (song.id, song)
            })
            .collect();
        Self { songs }
    }
}

#[async_trait]
impl SongSource for Library {
    async fn fetch_song(&self, id: SongId) -> BridgeResult<Option<Song>> {
        Ok(self.songs.get(&id).cloned())
    }
}

pub struct Locator;

#[async_trait]
impl MediaLocator for Locator {
    async fn file_url(&self, file_path: &str) -> BridgeResult<String> {
        Ok(format!("file://{}", file_path))
    }

    async fn artwork_url(&self, thumbnail_path: &str) -> BridgeResult<String> {
        Ok(format!("file://{}", thumbnail_path))
    }
}

pub struct Bridges {
    pub engine: QueueEngine,
    pub store: Arc<InMemorySettingsStore>,
}

pub fn bridges() -> Bridges {
    Bridges {
        engine: QueueEngine::default(),
        store: Arc::new(InMemorySettingsStore::new()),
    }
}

impl Bridges {
    pub fn config(&self, features: FeatureFlags) -> CoreConfig {
        let store: Arc<dyn SettingsStore> = self.store.clone();
        CoreConfig::builder()
            .state_dir("/tmp/mqc-service-tests")
            .audio_engine(Arc::new(self.engine.clone()))
            .song_source(Arc::new(Library::with_songs(1..=20)))
            .media_locator(Arc::new(Locator))
            .settings_store(store)
            .features(features)
            .build()
            .expect("config")
    }
}

/// Poll `condition` until it holds or a second has passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
