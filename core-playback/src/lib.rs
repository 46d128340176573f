//! # Playback Queue Core
//!
//! Owns the play queue and keeps a bounded window of it loaded in the host's
//! native audio engine.
//!
//! ## Overview
//!
//! This crate handles:
//! - Session loading, shuffle, insertion, removal and reordering
//! - Planning which slice of the queue is materialized in the engine
//! - A pinned LRU of song metadata for the active window
//! - Resolving songs into playable engine tracks
//! - Persisting the session and restoring it at startup
//!
//! ## Components
//!
//! - [`QueueCoordinator`] - State owner and the only caller of the engine
//! - [`WindowPlanner`] - Pure window arithmetic
//! - [`SongCache`] - LRU with priority pinning
//! - [`EngineDriver`] - Ordered, optionally time-limited engine calls
//! - [`TrackResolver`] / [`LibraryTrackResolver`] - Song to track conversion
//! - [`RehydrationController`] - Exactly-once startup restore

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod rehydration;
pub mod resolver;
pub mod song_cache;
pub mod state;
pub mod window;

pub use config::PlayerConfig;
pub use coordinator::{LoadRequest, QueueCoordinator};
pub use engine::EngineDriver;
pub use error::{QueueError, Result};
pub use persistence::{PersistedQueueState, QueueStatePersister};
pub use rehydration::{HydrationSignal, RehydrationController, RehydrationOutcome};
pub use resolver::{LibraryTrackResolver, TrackResolver};
pub use song_cache::SongCache;
pub use state::{navigation_flags, validate_queue_integrity, PlaySource, PlayerSnapshot, QueuePosition};
pub use window::{optimal_window, Window, WindowPlanner};
