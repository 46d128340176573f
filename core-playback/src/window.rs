//! # Window Planner
//!
//! Decides which contiguous slice of the play order is materialized in the
//! audio engine.
//!
//! ```text
//! queue:   0 1 2 3 4 5 6 7 8 9
//!                [-----)            window = [3, 6)
//!                  ^ current
//! engine:        0 1 2              player index = queue index - start
//! ```
//!
//! Everything here is pure; the coordinator owns the side effects.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::PlayerConfig;

/// Half-open range `[start, end)` of queue indices loaded into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub const EMPTY: Window = Window { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Engine-relative index of a queue index inside the window.
    pub fn player_index(&self, queue_index: usize) -> Option<usize> {
        self.contains(queue_index).then(|| queue_index - self.start)
    }
}

/// Centers a window of `min(window_size, queue_len)` entries on
/// `current_index`, shifted left when it would run past the end of the queue.
///
/// An index past the end is treated as the last entry.
pub fn optimal_window(current_index: usize, queue_len: usize, window_size: usize) -> Window {
    if queue_len == 0 || window_size == 0 {
        return Window::EMPTY;
    }

    let size = window_size.min(queue_len);
    let current = current_index.min(queue_len - 1);
    let half = size / 2;

    let mut start = current.saturating_sub(half);
    let end = (start + size).min(queue_len);
    if end == queue_len {
        start = queue_len - size;
    }

    Window::new(start, end)
}

/// Window sizing policy derived from [`PlayerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlanner {
    window_size: usize,
    lookahead_margin: usize,
    extension_batch: usize,
}

impl WindowPlanner {
    pub fn new(window_size: usize, lookahead_margin: usize, extension_batch: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            lookahead_margin,
            extension_batch: extension_batch.max(1),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            config.window_size,
            config.lookahead_margin,
            config.extension_batch,
        )
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn with_window_size(self, window_size: usize) -> Self {
        Self::new(window_size, self.lookahead_margin, self.extension_batch)
    }

    pub fn plan(&self, current_index: usize, queue_len: usize) -> Window {
        optimal_window(current_index, queue_len, self.window_size)
    }

    /// Whether `index` sits close enough to the trailing edge of `window` that
    /// the next batch should be appended.
    pub fn needs_extension(&self, window: Window, index: usize, queue_len: usize) -> bool {
        window.contains(index)
            && window.end < queue_len
            && index + self.lookahead_margin >= window.end
    }

    /// Queue indices to append for a trailing-edge extension.
    pub fn extension(&self, window: Window, queue_len: usize) -> Range<usize> {
        let end = (window.end + self.extension_batch).min(queue_len);
        window.end..end.max(window.end)
    }
}

impl Default for WindowPlanner {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}
