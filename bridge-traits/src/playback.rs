//! Playback bridge traits and supporting types.
//!
//! The native audio engine (decoding, mixing, output, OS media session) lives
//! in the host. The core drives it through the narrow [`AudioEngine`] command
//! set and learns about engine-side changes through [`EngineEvent`]s the host
//! forwards back.
//!
//! Every engine method is asynchronous and must complete atomically relative
//! to the awaiting caller: when the future resolves, the engine's own queue
//! already reflects the command.

use serde::{Deserialize, Serialize};

use crate::{error::Result, library::SongId, platform::PlatformSendSync};

/// Playable track descriptor handed to the audio engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: SongId,
    pub title: String,
    /// Artist display string.
    pub artist: String,
    /// Album display string, empty when the song has no album.
    pub album: String,
    /// Media URL the engine streams from.
    pub url: String,
    pub artwork: Option<String>,
    /// Duration in seconds.
    pub duration: f64,
}

/// Repeat behaviour shared by the queue and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    /// Repeat the current track.
    Track,
    /// Wrap around at both ends of the queue.
    Queue,
}

/// Partial metadata update for a track already materialized in the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadataPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub duration: Option<f64>,
}

impl From<&Track> for TrackMetadataPatch {
    fn from(track: &Track) -> Self {
        Self {
            title: Some(track.title.clone()),
            artist: Some(track.artist.clone()),
            album: Some(track.album.clone()),
            artwork: track.artwork.clone(),
            duration: Some(track.duration),
        }
    }
}

/// Engine playback state as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    None,
    Ready,
    Loading,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl EngineState {
    pub fn is_loading(self) -> bool {
        matches!(self, EngineState::Loading | EngineState::Buffering)
    }
}

/// Notifications the host forwards from its engine callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine moved to another entry of its materialized queue.
    ActiveTrackChanged { index: Option<usize> },
    /// Periodic progress report, all values in seconds.
    Progress {
        position: f64,
        duration: f64,
        buffered: f64,
    },
    StateChanged(EngineState),
    Error { message: String },
}

/// Command surface of the native audio engine.
///
/// Indices are relative to the engine's own queue (the materialized window),
/// never to the full logical queue.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioEngine: PlatformSendSync {
    /// Drop every track from the engine queue and stop output.
    async fn reset(&self) -> Result<()>;

    /// Insert tracks before `at_index`, or append when `None`.
    async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> Result<()>;

    async fn remove(&self, index: usize) -> Result<()>;

    async fn move_track(&self, from: usize, to: usize) -> Result<()>;

    /// Make the track at `index` the active one.
    async fn skip(&self, index: usize) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Re-attempt loading the active track after a playback error.
    async fn retry(&self) -> Result<()>;

    /// Seek to an absolute position in seconds.
    async fn seek_to(&self, position: f64) -> Result<()>;

    /// Seek relative to the current position, in seconds.
    async fn seek_by(&self, delta: f64) -> Result<()>;

    /// Output volume in `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()>;

    /// Tracks currently materialized in the engine, in engine order.
    async fn get_queue(&self) -> Result<Vec<Track>>;

    async fn get_active_index(&self) -> Result<Option<usize>>;

    async fn update_metadata_for_track(&self, index: usize, patch: TrackMetadataPatch)
        -> Result<()>;
}
