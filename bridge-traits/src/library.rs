//! Library bridge traits and the song metadata the queue core consumes.
//!
//! The song library (database, remote catalog, file index) is owned by the host
//! application. The core only needs two capabilities from it:
//!
//! - [`SongSource`] - fetch song metadata by id, individually or in batches
//! - [`MediaLocator`] - turn stored file and thumbnail references into URLs the
//!   audio engine and the UI can load
//!
//! Everything else about a [`Song`] is opaque to the queue.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Result, platform::PlatformSendSync};

/// Numeric identifier of a song in the host library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(i64);

impl SongId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for SongId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for SongId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Artist credited on a song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: i64,
    pub name: String,
}

/// Album a song belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: i64,
    pub name: String,
}

/// Song metadata as stored by the host library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub name: String,
    /// Storage reference of the audio file (path or provider key).
    pub file_path: String,
    /// Storage reference of the cover thumbnail, when one exists.
    pub thumbnail_path: Option<String>,
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumRef>,
    /// Duration in seconds.
    pub duration: f64,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub last_played_at: Option<DateTime<Utc>>,
}

impl Song {
    /// Artist names joined for display.
    pub fn artist_display(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Song metadata provider.
///
/// Lookups may hit a database or the network and can be slow. A song that does
/// not exist is reported as `Ok(None)`; transport failures are errors. The core
/// treats both as an unresolvable id and never merges a partial result into its
/// state.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::library::{SongId, SongSource};
///
/// async fn title_of(source: &dyn SongSource, id: SongId) -> Option<String> {
///     source.fetch_song(id).await.ok().flatten().map(|song| song.name)
/// }
/// ```
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait SongSource: PlatformSendSync {
    /// Fetch a single song by id.
    async fn fetch_song(&self, id: SongId) -> Result<Option<Song>>;

    /// Fetch a batch of songs. Missing ids are simply absent from the result.
    ///
    /// The default implementation issues one `fetch_song` per id; hosts with a
    /// batched query should override it.
    async fn prefetch_songs(&self, ids: &[SongId]) -> Result<Vec<Song>> {
        let mut songs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(song) = self.fetch_song(*id).await? {
                songs.push(song);
            }
        }
        Ok(songs)
    }
}

/// Resolves stored media references into loadable URLs.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait MediaLocator: PlatformSendSync {
    /// URL the audio engine streams the file from.
    async fn file_url(&self, file_path: &str) -> Result<String>;

    /// URL of a thumbnail image.
    async fn artwork_url(&self, thumbnail_path: &str) -> Result<String>;
}
