//! Session loading.

use bridge_traits::SongId;
use core_runtime::events::{PlaybackEvent, QueueEvent};
use rand::Rng;
use tracing::{info, instrument};

use super::{shuffle::shuffle_with_anchor, Activity, QueueCoordinator};
use crate::error::{QueueError, Result};
use crate::state::PlaySource;

/// Parameters of a fresh playback session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub song_ids: Vec<SongId>,
    pub start_index: usize,
    pub source: PlaySource,
    pub context_id: Option<String>,
    /// Shuffle even if shuffle is currently disabled (and enable it).
    pub force_shuffle: bool,
}

impl LoadRequest {
    pub fn new(song_ids: Vec<SongId>, start_index: usize) -> Self {
        Self {
            song_ids,
            start_index,
            source: PlaySource::Unknown,
            context_id: None,
            force_shuffle: false,
        }
    }

    pub fn with_source(mut self, source: PlaySource, context_id: Option<String>) -> Self {
        self.source = source;
        self.context_id = context_id;
        self
    }

    pub fn shuffled(mut self) -> Self {
        self.force_shuffle = true;
        self
    }
}

impl QueueCoordinator {
    /// Start a new session from `request`.
    ///
    /// The track at `start_index` becomes current. With shuffle active it is
    /// moved to the front and the rest of the list is permuted.
    #[instrument(skip(self, request), fields(length = request.song_ids.len(), start_index = request.start_index, source = %request.source))]
    pub async fn load_tracks(&self, request: LoadRequest) -> Result<()> {
        let _guard = self.begin_mutation("load", Activity::Queue)?;
        let outcome = self.load_locked(request).await;
        self.settle(outcome).await
    }

    /// Load `song_ids` shuffled from a random starting track, then play.
    #[instrument(skip(self, song_ids), fields(length = song_ids.len(), source = %source))]
    pub async fn shuffle_and_play(
        &self,
        song_ids: Vec<SongId>,
        source: PlaySource,
        context_id: Option<String>,
    ) -> Result<()> {
        if song_ids.is_empty() {
            return Err(QueueError::invalid("cannot shuffle an empty track list"));
        }

        let start_index = rand::thread_rng().gen_range(0..song_ids.len());
        let request = LoadRequest::new(song_ids, start_index)
            .with_source(source, context_id)
            .shuffled();

        self.load_tracks(request).await?;
        self.play().await
    }

    pub(crate) async fn load_locked(&self, request: LoadRequest) -> Result<()> {
        let LoadRequest {
            song_ids,
            start_index,
            source,
            context_id,
            force_shuffle,
        } = request;

        if song_ids.is_empty() {
            return Err(QueueError::invalid("cannot load an empty track list"));
        }
        if start_index >= song_ids.len() {
            return Err(QueueError::invalid(format!(
                "start index {} out of range for {} tracks",
                start_index,
                song_ids.len()
            )));
        }

        let (shuffle, window_size) =
            self.read(|state| (force_shuffle || state.shuffle_enabled, state.window_size));

        let (queue_ids, current) = if shuffle {
            (shuffle_with_anchor(&song_ids, start_index), 0)
        } else {
            (song_ids.clone(), start_index)
        };

        let window = self.planner().plan(current, queue_ids.len());
        if !window.contains(current) {
            return Err(QueueError::Integrity(format!(
                "planned window {:?} excludes start index {}",
                window, current
            )));
        }

        let track = match self.materialize(&queue_ids, window, current).await {
            Ok(track) => track,
            Err(e) => {
                // A rejected load leaves any previous session in charge of the cache
                self.repin_live_window();
                return Err(e);
            }
        };
        // New session: nothing from the previous one may influence pinning
        self.cache().lock().retain_pinned(window_size);
        let track_id = track.id;
        let length = queue_ids.len();

        self.update(|state| {
            state.track_ids = song_ids;
            state.queue_ids = queue_ids;
            state.current_index = Some(current);
            state.duration = track.duration;
            state.current_track = Some(track);
            state.window = window;
            state.position = 0.0;
            state.buffered = 0.0;
            state.shuffle_enabled = shuffle;
            state.play_source = source;
            state.source_context_id = context_id;
        });

        info!(
            length,
            current,
            shuffled = shuffle,
            window_start = window.start,
            window_end = window.end,
            "Loaded queue"
        );
        self.emit_queue(QueueEvent::Loaded {
            source: source.to_string(),
            length,
            current_index: current,
            shuffled: shuffle,
        });
        self.emit_playback(PlaybackEvent::TrackChanged {
            track_id: track_id.get(),
            queue_index: current,
        });

        Ok(())
    }
}
