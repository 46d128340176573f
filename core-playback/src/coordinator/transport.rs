//! Transport controls. None of these touch the queue, so they do not take
//! the mutation guard.

use bridge_traits::RepeatMode;
use core_runtime::events::PlaybackEvent;
use tracing::{debug, instrument};

use super::QueueCoordinator;
use crate::error::{QueueError, Result};

impl QueueCoordinator {
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let Some(track_id) = self.read(|state| state.current_track_id()) else {
            return Err(QueueError::invalid("no track loaded"));
        };

        self.engine().play().await?;
        self.update(|state| state.is_playing = true);
        self.emit_playback(PlaybackEvent::Started {
            track_id: track_id.get(),
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        self.engine().pause().await?;
        let track_id = self.update(|state| {
            state.is_playing = false;
            state.current_track_id()
        });
        self.emit_playback(PlaybackEvent::Paused {
            track_id: track_id.map(|id| id.get()),
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        self.engine().stop().await?;
        self.update(|state| {
            state.is_playing = false;
            state.position = 0.0;
        });
        self.emit_playback(PlaybackEvent::Stopped);
        Ok(())
    }

    /// Ask the engine to reload the current track after a playback error.
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<()> {
        self.engine().retry().await
    }

    /// Seek to `position` seconds, clamped to the current track.
    #[instrument(skip(self))]
    pub async fn seek_to(&self, position: f64) -> Result<()> {
        let duration = self.read(|state| state.duration);
        let target = clamp_position(position, duration);

        self.engine().seek_to(target).await?;
        self.update(|state| state.position = target);
        self.emit_playback(PlaybackEvent::PositionChanged {
            position: target,
            duration,
        });
        Ok(())
    }

    /// Seek relative to the current position, clamped to the current track.
    #[instrument(skip(self))]
    pub async fn seek_by(&self, delta: f64) -> Result<()> {
        let (position, duration) = self.read(|state| (state.position, state.duration));
        let target = clamp_position(position + delta, duration);

        self.engine().seek_by(target - position).await?;
        self.update(|state| state.position = target);
        self.emit_playback(PlaybackEvent::PositionChanged {
            position: target,
            duration,
        });
        Ok(())
    }

    /// Set the volume in `[0, 1]`. While muted only the stored value changes.
    #[instrument(skip(self))]
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };

        if !self.read(|state| state.is_muted) {
            self.engine().set_volume(volume).await?;
        }
        self.update(|state| state.volume = volume);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        let volume = self.read(|state| state.volume);
        self.engine()
            .set_volume(if muted { 0.0 } else { volume })
            .await?;
        self.update(|state| state.is_muted = muted);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.engine().set_repeat_mode(mode).await?;
        self.update(|state| state.repeat_mode = mode);
        debug!(?mode, "Repeat mode changed");
        Ok(())
    }
}

fn clamp_position(position: f64, duration: f64) -> f64 {
    let position = if position.is_nan() { 0.0 } else { position.max(0.0) };
    if duration > 0.0 {
        position.min(duration)
    } else {
        position
    }
}
