//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback queue core and the
//! host application. Each trait represents a capability the core requires but
//! that is implemented differently per platform (desktop, iOS, Android, web).
//!
//! ## Traits
//!
//! ### Playback
//! - [`AudioEngine`](playback::AudioEngine) - Narrow command set of the native audio engine
//!
//! ### Library
//! - [`SongSource`](library::SongSource) - Song metadata fetch by id (single and batched)
//! - [`MediaLocator`](library::MediaLocator) - File and thumbnail reference to URL resolution
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value storage for the persisted session
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! keep the message actionable (which id, which path, which engine call).
//!
//! ## Thread Safety
//!
//! On native targets every bridge trait requires `Send + Sync` (through
//! [`PlatformSendSync`](platform::PlatformSendSync)) so implementations can be
//! shared across async tasks behind an `Arc`.

pub mod error;
pub mod library;
pub mod platform;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use library::{AlbumRef, ArtistRef, MediaLocator, Song, SongId, SongSource};
pub use playback::{
    AudioEngine, EngineEvent, EngineState, RepeatMode, Track, TrackMetadataPatch,
};
pub use storage::SettingsStore;
