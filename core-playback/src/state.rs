//! # Player State
//!
//! The observable snapshot published by the queue coordinator, plus the pure
//! rules every snapshot must satisfy.

use std::fmt;

use bridge_traits::{RepeatMode, SongId, Track};
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};
use crate::window::Window;

/// Where the current session was started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaySource {
    #[default]
    Unknown,
    Library,
    Album,
    Artist,
    Playlist,
    Favorites,
    Search,
    Queue,
}

impl PlaySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaySource::Unknown => "unknown",
            PlaySource::Library => "library",
            PlaySource::Album => "album",
            PlaySource::Artist => "artist",
            PlaySource::Playlist => "playlist",
            PlaySource::Favorites => "favorites",
            PlaySource::Search => "search",
            PlaySource::Queue => "queue",
        }
    }
}

impl fmt::Display for PlaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion point for [`add_to_queue`](crate::QueueCoordinator::add_to_queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    /// Right after the current track.
    Next,
    /// At the tail of the queue.
    End,
}

/// Immutable view of the player, published after every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    /// Session membership in its original order.
    pub track_ids: Vec<SongId>,
    /// Play order. Equal to `track_ids` unless shuffled.
    pub queue_ids: Vec<SongId>,
    pub current_index: Option<usize>,
    pub current_track: Option<Track>,

    /// Queue range currently materialized in the engine.
    pub window: Window,
    /// Target window size for this session.
    pub window_size: usize,

    pub position: f64,
    pub duration: f64,
    pub buffered: f64,

    pub is_playing: bool,
    pub is_track_loading: bool,
    pub is_queue_loading: bool,
    pub is_shuffling: bool,

    pub can_play_next: bool,
    pub can_play_previous: bool,

    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub volume: f32,
    pub is_muted: bool,

    pub play_source: PlaySource,
    pub source_context_id: Option<String>,

    pub has_hydrated: bool,
}

impl PlayerSnapshot {
    pub fn new(window_size: usize) -> Self {
        Self {
            track_ids: Vec::new(),
            queue_ids: Vec::new(),
            current_index: None,
            current_track: None,
            window: Window::EMPTY,
            window_size,
            position: 0.0,
            duration: 0.0,
            buffered: 0.0,
            is_playing: false,
            is_track_loading: false,
            is_queue_loading: false,
            is_shuffling: false,
            can_play_next: false,
            can_play_previous: false,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::Off,
            volume: 1.0,
            is_muted: false,
            play_source: PlaySource::Unknown,
            source_context_id: None,
            has_hydrated: false,
        }
    }

    /// Id at the current index of the play order.
    pub fn current_track_id(&self) -> Option<SongId> {
        self.current_index
            .and_then(|index| self.queue_ids.get(index).copied())
    }

    pub fn queue_len(&self) -> usize {
        self.queue_ids.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue_ids.is_empty()
    }

    pub(crate) fn refresh_navigation(&mut self) {
        let (next, previous) =
            navigation_flags(self.current_index, self.queue_ids.len(), self.repeat_mode);
        self.can_play_next = next;
        self.can_play_previous = previous;
    }

    /// Drop the session, keeping user settings.
    pub(crate) fn clear_session(&mut self) {
        self.track_ids.clear();
        self.queue_ids.clear();
        self.current_index = None;
        self.current_track = None;
        self.window = Window::EMPTY;
        self.position = 0.0;
        self.duration = 0.0;
        self.buffered = 0.0;
        self.is_playing = false;
        self.is_track_loading = false;
        self.refresh_navigation();
    }

    pub(crate) fn check_integrity(&self) -> Result<()> {
        validate_queue_integrity(
            &self.track_ids,
            &self.queue_ids,
            self.current_index,
            self.current_track_id(),
        )?;

        if let (Some(track), Some(id)) = (&self.current_track, self.current_track_id()) {
            if track.id != id {
                return Err(QueueError::Integrity(format!(
                    "current track {} does not match current id {}",
                    track.id, id
                )));
            }
        }

        if let Some(index) = self.current_index {
            if !self.window.contains(index) {
                return Err(QueueError::Integrity(format!(
                    "current index {} outside window {:?}",
                    index, self.window
                )));
            }
        }

        Ok(())
    }
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self::new(crate::config::PlayerConfig::default().window_size)
    }
}

/// `(can_play_next, can_play_previous)` for a position in a queue.
///
/// `RepeatMode::Queue` wraps in both directions. A single entry can only
/// navigate (to itself) under `RepeatMode::Queue`.
pub fn navigation_flags(
    current_index: Option<usize>,
    queue_len: usize,
    repeat_mode: RepeatMode,
) -> (bool, bool) {
    let Some(current) = current_index else {
        return (false, false);
    };
    if queue_len == 0 {
        return (false, false);
    }

    if repeat_mode == RepeatMode::Queue {
        return (true, true);
    }
    if queue_len == 1 {
        return (false, false);
    }

    (current + 1 < queue_len, current > 0)
}

/// Checks the queue invariants:
/// - both sequences have the same length
/// - they hold the same ids with the same multiplicity
/// - the current index is in range (and absent only for an empty queue)
/// - the current id matches the id at the current index
pub fn validate_queue_integrity(
    track_ids: &[SongId],
    queue_ids: &[SongId],
    current_index: Option<usize>,
    current_track_id: Option<SongId>,
) -> Result<()> {
    if track_ids.len() != queue_ids.len() {
        return Err(QueueError::Integrity(format!(
            "track list has {} ids but play order has {}",
            track_ids.len(),
            queue_ids.len()
        )));
    }

    let mut members = track_ids.to_vec();
    let mut order = queue_ids.to_vec();
    members.sort_unstable();
    order.sort_unstable();
    if members != order {
        return Err(QueueError::Integrity(
            "play order is not a permutation of the track list".to_string(),
        ));
    }

    match current_index {
        None if queue_ids.is_empty() => Ok(()),
        None => Err(QueueError::Integrity(
            "non-empty queue without a current index".to_string(),
        )),
        Some(index) if index >= queue_ids.len() => Err(QueueError::Integrity(format!(
            "current index {} out of range for {} entries",
            index,
            queue_ids.len()
        ))),
        Some(index) => match current_track_id {
            Some(id) if id != queue_ids[index] => Err(QueueError::Integrity(format!(
                "current id {} does not match id {} at index {}",
                id, queue_ids[index], index
            ))),
            _ => Ok(()),
        },
    }
}
