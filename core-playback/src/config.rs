//! # Player Configuration
//!
//! Tuning knobs for the playback window, caches and engine deadline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Queue coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Number of queue entries materialized in the audio engine.
    ///
    /// Default: 100.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Distance from the trailing window edge at which the window is extended
    /// without a reset.
    ///
    /// Default: 5.
    #[serde(default = "default_lookahead_margin")]
    pub lookahead_margin: usize,

    /// Number of ids appended per trailing-edge extension. Must exceed
    /// `lookahead_margin` so back-to-back extensions settle.
    ///
    /// Default: 10.
    #[serde(default = "default_extension_batch")]
    pub extension_batch: usize,

    /// Ids per batched library prefetch call.
    ///
    /// Default: 50.
    #[serde(default = "default_prefetch_batch")]
    pub prefetch_batch: usize,

    /// Capacity of the resolved media URL cache.
    ///
    /// Default: 150.
    #[serde(default = "default_track_url_cache_size")]
    pub track_url_cache_size: usize,

    /// Optional deadline for each engine call, in milliseconds.
    ///
    /// Default: none (an engine hang propagates to the caller).
    #[serde(default)]
    pub engine_timeout_ms: Option<u64>,

    /// Settings key the session snapshot is stored under.
    ///
    /// Default: `"player-storage"`.
    #[serde(default = "default_persistence_key")]
    pub persistence_key: String,

    /// Artwork URL used when a song has no thumbnail.
    #[serde(default)]
    pub default_artwork: Option<String>,
}

fn default_window_size() -> usize {
    100
}

fn default_lookahead_margin() -> usize {
    5
}

fn default_extension_batch() -> usize {
    10
}

fn default_prefetch_batch() -> usize {
    50
}

fn default_track_url_cache_size() -> usize {
    150
}

fn default_persistence_key() -> String {
    "player-storage".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            lookahead_margin: default_lookahead_margin(),
            extension_batch: default_extension_batch(),
            prefetch_batch: default_prefetch_batch(),
            track_url_cache_size: default_track_url_cache_size(),
            engine_timeout_ms: None,
            persistence_key: default_persistence_key(),
            default_artwork: None,
        }
    }
}

impl PlayerConfig {
    /// Small window for memory-constrained hosts.
    pub fn compact() -> Self {
        Self {
            window_size: 25,
            lookahead_margin: 3,
            extension_batch: 6,
            prefetch_batch: 25,
            ..Default::default()
        }
    }

    /// Large window for hosts whose engine handles long queues well.
    pub fn extended() -> Self {
        Self {
            window_size: 250,
            extension_batch: 25,
            prefetch_batch: 100,
            track_url_cache_size: 400,
            ..Default::default()
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be > 0".to_string());
        }

        if self.extension_batch <= self.lookahead_margin {
            return Err("extension_batch must be greater than lookahead_margin".to_string());
        }

        if self.prefetch_batch == 0 {
            return Err("prefetch_batch must be > 0".to_string());
        }

        if self.track_url_cache_size == 0 {
            return Err("track_url_cache_size must be > 0".to_string());
        }

        if self.engine_timeout_ms == Some(0) {
            return Err("engine_timeout_ms must be > 0 when set".to_string());
        }

        if self.persistence_key.is_empty() {
            return Err("persistence_key cannot be empty".to_string());
        }

        Ok(())
    }
}
