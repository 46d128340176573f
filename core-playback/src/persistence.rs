//! # Session Persistence
//!
//! Minimal serialized form of a playback session and its settings-store
//! round trip.
//!
//! Only ids, indices and user settings are stored. Resolved tracks and cache
//! contents are rebuilt on restore.

use std::sync::Arc;

use bridge_traits::{error::Result as BridgeResult, BridgeError, RepeatMode, SettingsStore, SongId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::state::{PlaySource, PlayerSnapshot};

/// Persisted projection of a [`PlayerSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueueState {
    #[serde(default)]
    pub track_ids: Vec<SongId>,
    #[serde(default)]
    pub queue_ids: Vec<SongId>,
    #[serde(default)]
    pub current_track_index: Option<usize>,
    #[serde(default)]
    pub current_track_id: Option<SongId>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub is_muted: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default)]
    pub is_shuffle_enabled: bool,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub window_size: usize,
    #[serde(default)]
    pub play_source: PlaySource,
    #[serde(default)]
    pub source_context_id: Option<String>,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for PersistedQueueState {
    fn default() -> Self {
        Self {
            track_ids: Vec::new(),
            queue_ids: Vec::new(),
            current_track_index: None,
            current_track_id: None,
            volume: default_volume(),
            is_muted: false,
            repeat_mode: RepeatMode::Off,
            is_shuffle_enabled: false,
            position: 0.0,
            window_size: 0,
            play_source: PlaySource::Unknown,
            source_context_id: None,
        }
    }
}

impl PersistedQueueState {
    pub fn is_empty(&self) -> bool {
        self.queue_ids.is_empty()
    }
}

impl From<&PlayerSnapshot> for PersistedQueueState {
    fn from(snapshot: &PlayerSnapshot) -> Self {
        Self {
            track_ids: snapshot.track_ids.clone(),
            queue_ids: snapshot.queue_ids.clone(),
            current_track_index: snapshot.current_index,
            current_track_id: snapshot.current_track_id(),
            volume: snapshot.volume,
            is_muted: snapshot.is_muted,
            repeat_mode: snapshot.repeat_mode,
            is_shuffle_enabled: snapshot.shuffle_enabled,
            position: snapshot.position,
            window_size: snapshot.window_size,
            play_source: snapshot.play_source,
            source_context_id: snapshot.source_context_id.clone(),
        }
    }
}

/// Reads and writes [`PersistedQueueState`] as JSON under one settings key.
pub struct QueueStatePersister {
    store: Arc<dyn SettingsStore>,
    key: String,
}

impl QueueStatePersister {
    pub fn new(store: Arc<dyn SettingsStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored session.
    ///
    /// An unreadable payload is treated as no session at all.
    pub async fn load(&self) -> BridgeResult<Option<PersistedQueueState>> {
        let Some(raw) = self.store.get_string(&self.key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable persisted session");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, state: &PersistedQueueState) -> BridgeResult<()> {
        let json =
            serde_json::to_string(state).map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.store.set_string(&self.key, &json).await?;
        debug!(key = %self.key, length = state.queue_ids.len(), "Persisted session");
        Ok(())
    }

    pub async fn clear(&self) -> BridgeResult<()> {
        self.store.delete(&self.key).await
    }
}

impl std::fmt::Debug for QueueStatePersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStatePersister")
            .field("key", &self.key)
            .finish()
    }
}
