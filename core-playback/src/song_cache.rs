//! # Song Cache
//!
//! Bounded LRU of song metadata keyed by id, with priority pinning.
//!
//! ## Overview
//!
//! The coordinator keeps every song of the materialized window in this cache
//! so tracks can be resolved without a library round trip. Ids of the active
//! window are *pinned*: eviction always picks the least recently used
//! unpinned entry, and a bulk update grows the capacity rather than drop a
//! pinned song.
//!
//! A miss is a normal return value. Callers fetch on miss.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use bridge_traits::{Song, SongId};
use lru::LruCache;
use tracing::debug;

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// LRU song metadata cache with pinned priority ids.
pub struct SongCache {
    entries: LruCache<SongId, Song>,
    pinned: HashSet<SongId>,
}

impl SongCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(non_zero(capacity)),
            pinned: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a song and mark it most recently used.
    pub fn get(&mut self, id: SongId) -> Option<Song> {
        self.entries.get(&id).cloned()
    }

    /// Look up a song without touching recency.
    pub fn peek(&self, id: SongId) -> Option<&Song> {
        self.entries.peek(&id)
    }

    pub fn has(&self, id: SongId) -> bool {
        self.entries.contains(&id)
    }

    pub fn is_pinned(&self, id: SongId) -> bool {
        self.pinned.contains(&id)
    }

    /// Insert or replace a song and mark it most recently used.
    ///
    /// When the cache is full the least recently used *unpinned* entry is
    /// evicted. If every entry is pinned the capacity grows by one instead.
    pub fn set(&mut self, id: SongId, song: Song) {
        if !self.entries.contains(&id) && self.entries.len() >= self.capacity() {
            let victim = self
                .entries
                .iter()
                .rev()
                .map(|(key, _)| *key)
                .find(|key| !self.pinned.contains(key));

            match victim {
                Some(key) => {
                    self.entries.pop(&key);
                }
                None => {
                    let grown = self.capacity() + 1;
                    self.entries.resize(non_zero(grown));
                }
            }
        }

        self.entries.put(id, song);
    }

    pub fn remove(&mut self, id: SongId) -> Option<Song> {
        self.pinned.remove(&id);
        self.entries.pop(&id)
    }

    /// Replace the pinned set.
    pub fn pin(&mut self, ids: &[SongId]) {
        self.pinned = ids.iter().copied().collect();
        if self.pinned.len() > self.capacity() {
            self.entries.resize(non_zero(self.pinned.len()));
        }
    }

    /// Ids from `ids` that are not cached, deduplicated, in first-seen order.
    pub fn missing(&self, ids: &[SongId]) -> Vec<SongId> {
        let mut seen = HashSet::new();
        ids.iter()
            .copied()
            .filter(|id| !self.entries.contains(id) && seen.insert(*id))
            .collect()
    }

    /// Insert `songs` as one atomic replacement of the cache contents.
    ///
    /// With `priority` ids:
    /// - capacity grows to at least `priority.len()` (it never shrinks)
    /// - priority songs already cached but absent from `songs` are kept
    /// - the pinned set becomes exactly `priority`
    ///
    /// Capacity also grows so that `songs` and the kept priority songs all
    /// fit: nothing inserted here is evicted by the same update. Remaining
    /// capacity is filled with previous entries, most recent first.
    pub fn bulk_update(&mut self, songs: Vec<Song>, priority: Option<&[SongId]>) {
        let mut capacity = self.capacity();
        let pinned: HashSet<SongId> = match priority {
            Some(ids) => {
                capacity = capacity.max(ids.len());
                ids.iter().copied().collect()
            }
            None => self.pinned.clone(),
        };

        let incoming_ids: HashSet<SongId> = songs.iter().map(|song| song.id).collect();

        let preserved: Vec<Song> = pinned
            .iter()
            .filter(|id| !incoming_ids.contains(id))
            .filter_map(|id| self.entries.peek(id).cloned())
            .collect();

        let used = incoming_ids.len() + preserved.len();
        capacity = capacity.max(used);
        let remaining = capacity.saturating_sub(used);
        let carried: Vec<(SongId, Song)> = self
            .entries
            .iter()
            .filter(|(id, _)| !incoming_ids.contains(id) && !pinned.contains(id))
            .take(remaining)
            .map(|(id, song)| (*id, song.clone()))
            .collect();

        let mut next = LruCache::new(non_zero(capacity));

        // Least important first so pinned songs end up most recent
        for (id, song) in carried.into_iter().rev() {
            next.put(id, song);
        }
        let (priority_songs, regular_songs): (Vec<Song>, Vec<Song>) =
            songs.into_iter().partition(|song| pinned.contains(&song.id));
        for song in regular_songs {
            next.put(song.id, song);
        }
        for song in preserved.into_iter().chain(priority_songs) {
            next.put(song.id, song);
        }

        debug!(
            capacity,
            entries = next.len(),
            pinned = pinned.len(),
            "Bulk-updated song cache"
        );

        self.entries = next;
        self.pinned = pinned;
    }

    /// Drop every unpinned entry and reset the bound to `capacity`, or to the
    /// pinned count when that is larger.
    pub fn retain_pinned(&mut self, capacity: usize) {
        let capacity = capacity.max(self.pinned.len());
        let kept: Vec<(SongId, Song)> = self
            .entries
            .iter()
            .rev()
            .filter(|(id, _)| self.pinned.contains(id))
            .map(|(id, song)| (*id, song.clone()))
            .collect();

        let mut next = LruCache::new(non_zero(capacity));
        for (id, song) in kept {
            next.put(id, song);
        }
        self.entries = next;
    }

    /// Drop everything and start over with `capacity`.
    pub fn clear(&mut self, capacity: usize) {
        self.entries = LruCache::new(non_zero(capacity));
        self.pinned.clear();
    }
}

impl std::fmt::Debug for SongCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SongCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("pinned", &self.pinned.len())
            .finish()
    }
}
