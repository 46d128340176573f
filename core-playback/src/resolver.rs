//! # Track Resolution
//!
//! Turns library [`Song`]s into engine [`Track`]s.
//!
//! Media and artwork URLs come from the host [`MediaLocator`] and are kept in a
//! small LRU keyed by song id, so re-materializing a window does not hit the
//! locator again for songs it already resolved.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{MediaLocator, Song, SongId, Track};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{QueueError, Result};

/// Converts songs into engine tracks.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, song: &Song) -> Result<Track>;

    /// Forget anything cached for `song` (its file or artwork changed).
    fn invalidate(&self, song: &Song);
}

#[derive(Debug, Clone)]
struct ResolvedUrls {
    url: String,
    artwork: Option<String>,
}

/// [`TrackResolver`] backed by the host's [`MediaLocator`].
pub struct LibraryTrackResolver {
    locator: Arc<dyn MediaLocator>,
    urls: Mutex<LruCache<SongId, ResolvedUrls>>,
    default_artwork: Option<String>,
}

impl LibraryTrackResolver {
    pub fn new(
        locator: Arc<dyn MediaLocator>,
        cache_size: usize,
        default_artwork: Option<String>,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            locator,
            urls: Mutex::new(LruCache::new(capacity)),
            default_artwork,
        }
    }

    async fn locate(&self, song: &Song) -> Result<ResolvedUrls> {
        if let Some(cached) = self.urls.lock().get(&song.id).cloned() {
            return Ok(cached);
        }

        let url = self.locator.file_url(&song.file_path).await.map_err(|e| {
            warn!(song_id = %song.id, error = %e, "Failed to resolve media URL");
            QueueError::CacheConsistency {
                missing: vec![song.id],
            }
        })?;

        // Missing artwork is cosmetic
        let artwork = match song.thumbnail_path.as_deref() {
            Some(path) => match self.locator.artwork_url(path).await {
                Ok(artwork) => Some(artwork),
                Err(e) => {
                    debug!(song_id = %song.id, error = %e, "Artwork unavailable");
                    None
                }
            },
            None => None,
        };

        let resolved = ResolvedUrls { url, artwork };
        self.urls.lock().put(song.id, resolved.clone());
        Ok(resolved)
    }
}

#[async_trait]
impl TrackResolver for LibraryTrackResolver {
    async fn resolve(&self, song: &Song) -> Result<Track> {
        let urls = self.locate(song).await?;

        Ok(Track {
            id: song.id,
            title: song.name.clone(),
            artist: song.artist_display(),
            album: song
                .album
                .as_ref()
                .map(|album| album.name.clone())
                .unwrap_or_default(),
            url: urls.url,
            artwork: urls.artwork.or_else(|| self.default_artwork.clone()),
            duration: song.duration,
        })
    }

    fn invalidate(&self, song: &Song) {
        self.urls.lock().pop(&song.id);
    }
}
