//! # Event Bus System
//!
//! Provides an event-driven architecture for the playback queue core using
//! `tokio::sync::broadcast`. Core modules publish typed events; hosts and
//! other modules subscribe independently.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for playback and queue changes
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ QueueCoordinator ├────────>│ EventBus  ├────────────>│ UI / host  │
//! └──────────────────┘         │ (broadcast│             └────────────┘
//! ┌──────────────────┐  emit   │  channel) │  subscribe  ┌────────────┐
//! │ Rehydration      ├────────>│           ├────────────>│ Analytics  │
//! └──────────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! let event_bus = EventBus::new(100);
//! let _subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Queue(QueueEvent::Cleared))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore the "no subscribers" error; an event nobody listens to is
//! not a failure of the operation that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Transport-level events (play, pause, position, track changes)
    Playback(PlaybackEvent),
    /// Queue and window events
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Queue(QueueEvent::Hydrated { restored: false, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Queue(QueueEvent::Loaded { .. })
            | CoreEvent::Queue(QueueEvent::Hydrated { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to transport state of the current track.
///
/// Track ids are the numeric library ids of the songs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Playback started or resumed.
    Started { track_id: i64 },
    /// Playback paused.
    Paused { track_id: Option<i64> },
    /// Playback stopped.
    Stopped,
    /// The current track changed.
    TrackChanged {
        track_id: i64,
        /// Index of the track in the play order.
        queue_index: usize,
    },
    /// Playback position changed (seek or natural progression).
    PositionChanged {
        /// Position in seconds.
        position: f64,
        /// Track duration in seconds.
        duration: f64,
    },
    /// Playback error occurred.
    Error {
        track_id: Option<i64>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events describing changes to the queue and its materialized window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// A new session was loaded.
    Loaded {
        /// Origin of the session (album, playlist, ...).
        source: String,
        length: usize,
        current_index: usize,
        shuffled: bool,
    },
    /// Shuffle was switched on or off.
    ShuffleChanged { enabled: bool, current_index: usize },
    /// Ids were inserted into the play order.
    TracksAdded { count: usize, at_index: usize },
    /// An entry was removed from the play order.
    TrackRemoved { track_id: i64, index: usize },
    /// An entry was moved inside the play order.
    TrackMoved { from: usize, to: usize },
    /// The queue was emptied.
    Cleared,
    /// The engine window was fully rebuilt around a new index.
    WindowShifted { start: usize, end: usize },
    /// The engine window grew at its trailing edge.
    WindowExtended { start: usize, end: usize },
    /// Startup restore finished.
    Hydrated {
        /// Whether a previous session was restored.
        restored: bool,
        length: usize,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Loaded { .. } => "Queue loaded",
            QueueEvent::ShuffleChanged { .. } => "Shuffle changed",
            QueueEvent::TracksAdded { .. } => "Tracks added to queue",
            QueueEvent::TrackRemoved { .. } => "Track removed from queue",
            QueueEvent::TrackMoved { .. } => "Track moved in queue",
            QueueEvent::Cleared => "Queue cleared",
            QueueEvent::WindowShifted { .. } => "Playback window shifted",
            QueueEvent::WindowExtended { .. } => "Playback window extended",
            QueueEvent::Hydrated { .. } => "Session restore finished",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let _queue_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Queue(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` when no matching event is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Some(Err(RecvError::Closed))
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
            }
        }
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
