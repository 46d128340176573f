//! # Core Configuration Module
//!
//! Provides configuration management for the playback queue core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges and settings the core needs. It
//! enforces fail-fast validation so a missing bridge is reported at startup
//! rather than on the first playback command.
//!
//! ## Required Dependencies
//!
//! - `AudioEngine` - The native playback engine
//! - `SongSource` - Song metadata lookups
//! - `MediaLocator` - File and artwork URL resolution
//! - `SettingsStore` - Persistence of the playback session
//!
//! When the `desktop-shims` feature is enabled, a JSON-file `SettingsStore`
//! under `state_dir` is injected automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .state_dir("/path/to/app-data")
//!     .audio_engine(Arc::new(MyEngine::new()))
//!     .song_source(Arc::new(MyLibrary::new()))
//!     .media_locator(Arc::new(MyLocator::new()))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioEngine, MediaLocator, SettingsStore, SongSource};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the playback queue core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for application state (default settings file location)
    pub state_dir: PathBuf,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,

    /// Native audio engine (required)
    pub audio_engine: Arc<dyn AudioEngine>,

    /// Song metadata provider (required)
    pub song_source: Arc<dyn SongSource>,

    /// Media URL resolution (required)
    pub media_locator: Arc<dyn MediaLocator>,

    /// Session persistence storage (required, desktop default available)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("state_dir", &self.state_dir)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("audio_engine", &"AudioEngine { ... }")
            .field("song_source", &"SongSource { ... }")
            .field("media_locator", &"MediaLocator { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Save the queue snapshot whenever its persisted fields change
    pub persist_queue: bool,

    /// Restore the previous session on startup
    pub restore_on_startup: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            persist_queue: true,
            restore_on_startup: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(Error::Config("State directory cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 10,000 events".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_state_dir: &std::path::Path) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "SettingsStore implementation is required for session persistence. \
         Desktop: enable the 'desktop-shims' feature to use the default JsonFileSettingsStore. \
         Mobile: inject platform-native settings (UserDefaults/DataStore). \
         Web: inject a localStorage-based settings store.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(state_dir: &std::path::Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::JsonFileSettingsStore;

    let store: Arc<dyn SettingsStore> =
        Arc::new(JsonFileSettingsStore::new(state_dir.join("settings.json")));
    Ok(store)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    state_dir: Option<PathBuf>,
    event_buffer_size: Option<usize>,
    audio_engine: Option<Arc<dyn AudioEngine>>,
    song_source: Option<Arc<dyn SongSource>>,
    media_locator: Option<Arc<dyn MediaLocator>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the application state directory.
    pub fn state_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_dir = Some(path.into());
        self
    }

    /// Sets the event bus buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the native audio engine adapter.
    pub fn audio_engine(mut self, engine: Arc<dyn AudioEngine>) -> Self {
        self.audio_engine = Some(engine);
        self
    }

    /// Sets the song metadata provider.
    pub fn song_source(mut self, source: Arc<dyn SongSource>) -> Self {
        self.song_source = Some(source);
        self
    }

    /// Sets the media URL locator.
    pub fn media_locator(mut self, locator: Arc<dyn MediaLocator>) -> Self {
        self.media_locator = Some(locator);
        self
    }

    /// Sets the settings store used for session persistence.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Enables or disables queue persistence.
    pub fn persist_queue(mut self, enabled: bool) -> Self {
        self.features.persist_queue = enabled;
        self
    }

    /// Enables or disables session restore on startup.
    pub fn restore_on_startup(mut self, enabled: bool) -> Self {
        self.features.restore_on_startup = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error with an actionable message when a required bridge is
    /// missing or a value is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let state_dir = self.state_dir.ok_or_else(|| {
            Error::Config("State directory is required. Use .state_dir() to set it.".to_string())
        })?;

        let audio_engine = self.audio_engine.ok_or_else(|| {
            capability_missing(
                "AudioEngine",
                "An AudioEngine adapter is required to drive playback. \
                 Inject the host's native player through .audio_engine().",
            )
        })?;

        let song_source = self.song_source.ok_or_else(|| {
            capability_missing(
                "SongSource",
                "A SongSource is required to resolve queued song ids. \
                 Inject the host library through .song_source().",
            )
        })?;

        let media_locator = self.media_locator.ok_or_else(|| {
            capability_missing(
                "MediaLocator",
                "A MediaLocator is required to turn file references into playable URLs. \
                 Inject one through .media_locator().",
            )
        })?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&state_dir)?,
        };

        let config = CoreConfig {
            state_dir,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            audio_engine,
            song_source,
            media_locator,
            settings_store,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{Song, SongId, Track, TrackMetadataPatch, RepeatMode};

    struct NullEngine;

    #[async_trait]
    impl AudioEngine for NullEngine {
        async fn reset(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn add(&self, _tracks: Vec<Track>, _at_index: Option<usize>) -> BridgeResult<()> {
            Ok(())
        }
        async fn remove(&self, _index: usize) -> BridgeResult<()> {
            Ok(())
        }
        async fn move_track(&self, _from: usize, _to: usize) -> BridgeResult<()> {
            Ok(())
        }
        async fn skip(&self, _index: usize) -> BridgeResult<()> {
            Ok(())
        }
        async fn play(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn pause(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn stop(&self) -> BridgeResult<()> {
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
        async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
            Ok(())
        }
        async fn set_repeat_mode(&self, _mode: RepeatMode) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_queue(&self) -> BridgeResult<Vec<Track>> {
            Ok(Vec::new())
        }
        async fn get_active_index(&self) -> BridgeResult<Option<usize>> {
            Ok(None)
        }
        async fn update_metadata_for_track(
            &self,
            _index: usize,
            _patch: TrackMetadataPatch,
        ) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NullSource;

    #[async_trait]
    impl SongSource for NullSource {
        async fn fetch_song(&self, _id: SongId) -> BridgeResult<Option<Song>> {
            Ok(None)
        }
    }

    struct NullLocator;

    #[async_trait]
    impl MediaLocator for NullLocator {
        async fn file_url(&self, file_path: &str) -> BridgeResult<String> {
            Ok(format!("file://{}", file_path))
        }
        async fn artwork_url(&self, thumbnail_path: &str) -> BridgeResult<String> {
            Ok(format!("file://{}", thumbnail_path))
        }
    }

    struct NullStore;

    #[async_trait]
    impl SettingsStore for NullStore {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .state_dir("/tmp/mqc-test")
            .audio_engine(Arc::new(NullEngine))
            .song_source(Arc::new(NullSource))
            .media_locator(Arc::new(NullLocator))
            .settings_store(Arc::new(NullStore))
    }

    #[test]
    fn test_build_with_all_bridges() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.state_dir, PathBuf::from("/tmp/mqc-test"));
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.features.persist_queue);
        assert!(config.features.restore_on_startup);
    }

    #[test]
    fn test_missing_state_dir() {
        let result = CoreConfig::builder()
            .audio_engine(Arc::new(NullEngine))
            .song_source(Arc::new(NullSource))
            .media_locator(Arc::new(NullLocator))
            .settings_store(Arc::new(NullStore))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_engine_is_capability_error() {
        let result = CoreConfig::builder()
            .state_dir("/tmp/mqc-test")
            .song_source(Arc::new(NullSource))
            .media_locator(Arc::new(NullLocator))
            .settings_store(Arc::new(NullStore))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioEngine")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_song_source_is_capability_error() {
        let result = CoreConfig::builder()
            .state_dir("/tmp/mqc-test")
            .audio_engine(Arc::new(NullEngine))
            .media_locator(Arc::new(NullLocator))
            .settings_store(Arc::new(NullStore))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "SongSource"
        ));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_settings_store_without_shims() {
        let result = CoreConfig::builder()
            .state_dir("/tmp/mqc-test")
            .audio_engine(Arc::new(NullEngine))
            .song_source(Arc::new(NullSource))
            .media_locator(Arc::new(NullLocator))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "SettingsStore"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_default_settings_store_with_shims() {
        let result = CoreConfig::builder()
            .state_dir("/tmp/mqc-test")
            .audio_engine(Arc::new(NullEngine))
            .song_source(Arc::new(NullSource))
            .media_locator(Arc::new(NullLocator))
            .build();

        assert!(result.is_ok());
    }

    #[test]
    fn test_event_buffer_bounds() {
        assert!(complete_builder().event_buffer_size(0).build().is_err());
        assert!(complete_builder().event_buffer_size(20_000).build().is_err());
        assert!(complete_builder().event_buffer_size(500).build().is_ok());
    }

    #[test]
    fn test_feature_flags() {
        let config = complete_builder()
            .persist_queue(false)
            .restore_on_startup(false)
            .build()
            .unwrap();

        assert_eq!(
            config.features,
            FeatureFlags {
                persist_queue: false,
                restore_on_startup: false,
            }
        );
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = complete_builder().build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("AudioEngine { ... }"));
        assert!(rendered.contains("state_dir"));
    }
}
