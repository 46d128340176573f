//! Shuffle toggling with surgical engine reconciliation.

use bridge_traits::SongId;
use core_runtime::events::QueueEvent;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info, instrument};

use super::{Activity, QueueCoordinator};
use crate::error::{QueueError, Result};

/// `ids[anchor]` followed by the remaining ids in random order.
pub(crate) fn shuffle_with_anchor(ids: &[SongId], anchor: usize) -> Vec<SongId> {
    shuffle_with_anchor_using(ids, anchor, &mut rand::thread_rng())
}

fn shuffle_with_anchor_using<R: Rng + ?Sized>(
    ids: &[SongId],
    anchor: usize,
    rng: &mut R,
) -> Vec<SongId> {
    if anchor >= ids.len() {
        let mut all = ids.to_vec();
        all.shuffle(rng);
        return all;
    }

    let mut rest = ids.to_vec();
    let anchor_id = rest.remove(anchor);
    rest.shuffle(rng);

    let mut order = Vec::with_capacity(ids.len());
    order.push(anchor_id);
    order.extend(rest);
    order
}

impl QueueCoordinator {
    /// Flip shuffle on or off.
    pub async fn toggle_shuffle(&self) -> Result<()> {
        let enabled = self.read(|state| state.shuffle_enabled);
        self.set_shuffle_enabled(!enabled).await
    }

    /// Enable or disable shuffle, keeping the current track playing.
    ///
    /// Enabling puts the current track first and permutes the rest. Disabling
    /// restores the original order and relocates the current index. The engine
    /// keeps its active track: everything around it is removed and the new
    /// window's neighbours are added back on either side.
    #[instrument(skip(self))]
    pub async fn set_shuffle_enabled(&self, enabled: bool) -> Result<()> {
        let _guard = self.begin_mutation("shuffle", Activity::Shuffle)?;
        let outcome = self.apply_shuffle(enabled).await;
        self.settle(outcome).await
    }

    async fn apply_shuffle(&self, enabled: bool) -> Result<()> {
        let (track_ids, queue_ids, current, already) = self.read(|state| {
            (
                state.track_ids.clone(),
                state.queue_ids.clone(),
                state.current_index,
                state.shuffle_enabled,
            )
        });

        if already == enabled {
            debug!(enabled, "Shuffle already in requested state");
            return Ok(());
        }

        let Some(current) = current else {
            self.update(|state| state.shuffle_enabled = enabled);
            self.emit_queue(QueueEvent::ShuffleChanged {
                enabled,
                current_index: 0,
            });
            return Ok(());
        };

        let anchor_id = queue_ids[current];
        let (next_order, next_index) = if enabled {
            (shuffle_with_anchor(&queue_ids, current), 0)
        } else {
            let index = track_ids
                .iter()
                .position(|id| *id == anchor_id)
                .ok_or_else(|| {
                    QueueError::Integrity(format!(
                        "current id {} missing from track list",
                        anchor_id
                    ))
                })?;
            (track_ids.clone(), index)
        };

        let window = self.planner().plan(next_index, next_order.len());
        let Some(anchor_offset) = window.player_index(next_index) else {
            return Err(QueueError::Integrity(format!(
                "planned window {:?} excludes anchor index {}",
                window, next_index
            )));
        };

        let window_ids = next_order[window.range()].to_vec();
        let songs = self.ensure_cached(&window_ids, Some(&window_ids)).await?;
        let mut tracks = self.resolve_tracks(&songs).await?;
        let current_track = tracks[anchor_offset].clone();

        let engine_queue = self.engine().queue().await?;
        let active = self.engine().active_index().await?;
        let active_is_anchor = active
            .and_then(|index| engine_queue.get(index))
            .is_some_and(|track| track.id == anchor_id);

        let rebuilt: Result<()> = async {
            match active {
                Some(active) if active_is_anchor => {
                    for index in (active + 1..engine_queue.len()).rev() {
                        self.engine().remove(index).await?;
                    }
                    for index in (0..active).rev() {
                        self.engine().remove(index).await?;
                    }

                    let after = tracks.split_off(anchor_offset + 1);
                    tracks.truncate(anchor_offset);
                    let before = tracks;

                    self.engine().add(before, Some(0)).await?;
                    self.engine().add(after, None).await?;

                    if self.engine().active_index().await? != Some(anchor_offset) {
                        self.engine().skip(anchor_offset).await?;
                    }
                }
                _ => {
                    debug!("Anchor is not the active engine track, rebuilding engine queue");
                    self.engine().reset().await?;
                    self.engine().add(tracks, None).await?;
                    self.engine().skip(anchor_offset).await?;
                }
            }
            Ok(())
        }
        .await;

        // A partial rebuild leaves the engine matching neither order
        if let Err(e) = rebuilt {
            error!(error = %e, "Engine rejected shuffled window, resetting to idle");
            self.reset_to_idle().await;
            return Err(e);
        }

        self.update(|state| {
            state.queue_ids = next_order;
            state.current_index = Some(next_index);
            state.current_track = Some(current_track);
            state.window = window;
            state.shuffle_enabled = enabled;
        });

        info!(
            enabled,
            current = next_index,
            window_start = window.start,
            window_end = window.end,
            "Shuffle changed"
        );
        self.emit_queue(QueueEvent::ShuffleChanged {
            enabled,
            current_index: next_index,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(values: &[i64]) -> Vec<SongId> {
        values.iter().copied().map(SongId::new).collect()
    }

    #[test]
    fn test_anchor_goes_first() {
        let mut rng = StdRng::seed_from_u64(7);
        let original = ids(&[10, 20, 30, 40, 50]);

        for anchor in 0..original.len() {
            let order = shuffle_with_anchor_using(&original, anchor, &mut rng);
            assert_eq!(order[0], original[anchor]);

            let mut sorted = order.clone();
            sorted.sort();
            assert_eq!(sorted, original);
        }
    }

    #[test]
    fn test_keeps_duplicates() {
        let mut rng = StdRng::seed_from_u64(1);
        let order = shuffle_with_anchor_using(&ids(&[1, 1, 2]), 2, &mut rng);
        assert_eq!(order[0], SongId::new(2));
        assert_eq!(order.iter().filter(|id| **id == SongId::new(1)).count(), 2);
    }

    #[test]
    fn test_single_entry() {
        assert_eq!(shuffle_with_anchor(&ids(&[5]), 0), ids(&[5]));
    }
}
