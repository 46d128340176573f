//! # Engine Driver
//!
//! Serializes every command sent to the host [`AudioEngine`].
//!
//! ## Overview
//!
//! Engine commands are asynchronous, but the engine's queue must see them in
//! exactly the order the coordinator issued them. The driver funnels every
//! call through one async gate so two commands never interleave, applies the
//! optional per-call deadline and converts bridge failures into
//! [`QueueError::Engine`] tagged with the command name.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{AudioEngine, RepeatMode, Track, TrackMetadataPatch};
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::error::{QueueError, Result};

pub struct EngineDriver {
    engine: Arc<dyn AudioEngine>,
    gate: Mutex<()>,
    timeout: Option<Duration>,
}

impl EngineDriver {
    pub fn new(engine: Arc<dyn AudioEngine>, timeout: Option<Duration>) -> Self {
        Self {
            engine,
            gate: Mutex::new(()),
            timeout,
        }
    }

    async fn call<T, F>(&self, operation: &'static str, command: F) -> Result<T>
    where
        F: Future<Output = bridge_traits::error::Result<T>>,
    {
        let _turn = self.gate.lock().await;
        trace!(operation, "Engine call");

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(operation, timeout_ms = limit.as_millis() as u64, "Engine call timed out");
                    return Err(QueueError::Engine {
                        operation,
                        message: format!("timed out after {}ms", limit.as_millis()),
                    });
                }
            },
            None => command.await,
        };

        outcome.map_err(|e| QueueError::Engine {
            operation,
            message: e.to_string(),
        })
    }

    pub async fn reset(&self) -> Result<()> {
        self.call("reset", self.engine.reset()).await
    }

    pub async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }
        self.call("add", self.engine.add(tracks, at_index)).await
    }

    pub async fn remove(&self, index: usize) -> Result<()> {
        self.call("remove", self.engine.remove(index)).await
    }

    pub async fn move_track(&self, from: usize, to: usize) -> Result<()> {
        self.call("move", self.engine.move_track(from, to)).await
    }

    pub async fn skip(&self, index: usize) -> Result<()> {
        self.call("skip", self.engine.skip(index)).await
    }

    pub async fn play(&self) -> Result<()> {
        self.call("play", self.engine.play()).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call("pause", self.engine.pause()).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.call("stop", self.engine.stop()).await
    }

    pub async fn retry(&self) -> Result<()> {
        self.call("retry", self.engine.retry()).await
    }

    pub async fn seek_to(&self, position: f64) -> Result<()> {
        self.call("seek_to", self.engine.seek_to(position)).await
    }

    pub async fn seek_by(&self, delta: f64) -> Result<()> {
        self.call("seek_by", self.engine.seek_by(delta)).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.call("set_volume", self.engine.set_volume(volume)).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.call("set_repeat_mode", self.engine.set_repeat_mode(mode))
            .await
    }

    pub async fn queue(&self) -> Result<Vec<Track>> {
        self.call("get_queue", self.engine.get_queue()).await
    }

    pub async fn active_index(&self) -> Result<Option<usize>> {
        self.call("get_active_index", self.engine.get_active_index())
            .await
    }

    pub async fn update_metadata(&self, index: usize, patch: TrackMetadataPatch) -> Result<()> {
        self.call(
            "update_metadata",
            self.engine.update_metadata_for_track(index, patch),
        )
        .await
    }
}

impl std::fmt::Debug for EngineDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineDriver")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Engine {}

        #[async_trait::async_trait]
        impl AudioEngine for Engine {
            async fn reset(&self) -> bridge_traits::error::Result<()>;
            async fn add(&self, tracks: Vec<Track>, at_index: Option<usize>) -> bridge_traits::error::Result<()>;
            async fn remove(&self, index: usize) -> bridge_traits::error::Result<()>;
            async fn move_track(&self, from: usize, to: usize) -> bridge_traits::error::Result<()>;
            async fn skip(&self, index: usize) -> bridge_traits::error::Result<()>;
            async fn play(&self) -> bridge_traits::error::Result<()>;
            async fn pause(&self) -> bridge_traits::error::Result<()>;
            async fn stop(&self) -> bridge_traits::error::Result<()>;
            async fn retry(&self) -> bridge_traits::error::Result<()>;
            async fn seek_to(&self, position: f64) -> bridge_traits::error::Result<()>;
            async fn seek_by(&self, delta: f64) -> bridge_traits::error::Result<()>;
            async fn set_volume(&self, volume: f32) -> bridge_traits::error::Result<()>;
            async fn set_repeat_mode(&self, mode: RepeatMode) -> bridge_traits::error::Result<()>;
            async fn get_queue(&self) -> bridge_traits::error::Result<Vec<Track>>;
            async fn get_active_index(&self) -> bridge_traits::error::Result<Option<usize>>;
            async fn update_metadata_for_track(&self, index: usize, patch: TrackMetadataPatch) -> bridge_traits::error::Result<()>;
        }
    }

    #[tokio::test]
    async fn test_forwards_arguments() {
        let mut engine = MockEngine::new();
        engine.expect_skip().with(eq(3)).times(1).returning(|_| Ok(()));

        let driver = EngineDriver::new(Arc::new(engine), None);
        driver.skip(3).await.unwrap();
    }

    #[tokio::test]
    async fn test_maps_bridge_errors() {
        let mut engine = MockEngine::new();
        engine
            .expect_remove()
            .returning(|_| Err(BridgeError::OperationFailed("index out of range".into())));

        let driver = EngineDriver::new(Arc::new(engine), None);
        let err = driver.remove(9).await.unwrap_err();

        match err {
            QueueError::Engine { operation, message } => {
                assert_eq!(operation, "remove");
                assert!(message.contains("index out of range"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_add_skips_engine() {
        let mut engine = MockEngine::new();
        engine.expect_add().times(0);

        let driver = EngineDriver::new(Arc::new(engine), None);
        driver.add(Vec::new(), None).await.unwrap();
    }

    struct HangingEngine;

    #[async_trait::async_trait]
    impl AudioEngine for HangingEngine {
        async fn reset(&self) -> bridge_traits::error::Result<()> {
            std::future::pending().await
        }
        async fn add(&self, _: Vec<Track>, _: Option<usize>) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn remove(&self, _: usize) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn move_track(&self, _: usize, _: usize) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn skip(&self, _: usize) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn play(&self) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn pause(&self) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn stop(&self) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn retry(&self) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn seek_to(&self, _: f64) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn seek_by(&self, _: f64) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn set_volume(&self, _: f32) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn set_repeat_mode(&self, _: RepeatMode) -> bridge_traits::error::Result<()> {
            Ok(())
        }
        async fn get_queue(&self) -> bridge_traits::error::Result<Vec<Track>> {
            Ok(Vec::new())
        }
        async fn get_active_index(&self) -> bridge_traits::error::Result<Option<usize>> {
            Ok(None)
        }
        async fn update_metadata_for_track(
            &self,
            _: usize,
            _: TrackMetadataPatch,
        ) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_timeout_surfaces_engine_error() {
        let driver = EngineDriver::new(Arc::new(HangingEngine), Some(Duration::from_millis(20)));

        let err = driver.reset().await.unwrap_err();
        assert!(matches!(err, QueueError::Engine { operation: "reset", .. }));

        // The gate was released
        driver.play().await.unwrap();
    }
}
