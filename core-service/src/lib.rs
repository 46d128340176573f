//! # Core Service
//!
//! Facade that wires host-provided bridges into the playback queue core.
//!
//! ## Overview
//!
//! [`CoreService::bootstrap`] takes a built [`CoreConfig`] and a
//! [`PlayerConfig`] and:
//! - creates the event bus, the track resolver and the [`QueueCoordinator`]
//! - starts the session task, which restores the persisted session (or skips
//!   restore when disabled) and then keeps the stored copy up to date
//!
//! The coordinator is usable as soon as `bootstrap` returns. Hosts that must
//! not show a half-restored player await [`CoreService::wait_until_hydrated`].
//! Engine callbacks are forwarded through [`CoreService::handle_engine_event`]
//! or pumped from a channel with [`CoreService::attach_engine_events`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_service::{CoreConfig, CoreService, PlayerConfig};
//!
//! let config = CoreConfig::builder()
//!     .state_dir(app_dir)
//!     .audio_engine(engine)
//!     .song_source(library)
//!     .media_locator(locator)
//!     .build()?;
//!
//! let service = CoreService::bootstrap(config, PlayerConfig::default())?;
//! service.wait_until_hydrated().await;
//! service.coordinator().play().await?;
//! ```

mod autosave;
pub mod error;

pub use core_playback::PlayerConfig;
pub use core_runtime::config::{CoreConfig, FeatureFlags};
pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{InMemorySettingsStore, JsonFileSettingsStore};

use std::sync::Arc;

use bridge_traits::EngineEvent;
use core_playback::{
    HydrationSignal, LibraryTrackResolver, QueueCoordinator, QueueStatePersister,
    RehydrationController,
};
use core_runtime::events::{CoreEvent, EventBus};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Primary façade exposed to host applications.
pub struct CoreService {
    coordinator: Arc<QueueCoordinator>,
    events: EventBus,
    persister: Arc<QueueStatePersister>,
    hydration: HydrationSignal,
    features: FeatureFlags,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CoreService {
    /// Build the core from `config` and start the session task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bootstrap(config: CoreConfig, player: PlayerConfig) -> Result<Self> {
        player.validate().map_err(CoreError::InitializationFailed)?;
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(format!("no Tokio runtime: {}", e)))?;

        let events = EventBus::new(config.event_buffer_size);
        let resolver = Arc::new(LibraryTrackResolver::new(
            Arc::clone(&config.media_locator),
            player.track_url_cache_size,
            player.default_artwork.clone(),
        ));
        let coordinator = Arc::new(
            QueueCoordinator::new(
                Arc::clone(&config.audio_engine),
                Arc::clone(&config.song_source),
                resolver,
                &player,
            )
            .with_event_bus(events.clone()),
        );
        let persister = Arc::new(QueueStatePersister::new(
            Arc::clone(&config.settings_store),
            player.persistence_key.clone(),
        ));

        let rehydration = RehydrationController::new(Arc::clone(&persister));
        let hydration = rehydration.signal();
        let features = config.features;

        let session = runtime.spawn(run_session(
            Arc::clone(&coordinator),
            rehydration,
            Arc::clone(&persister),
            features,
        ));

        info!(
            window_size = player.window_size,
            persist_queue = features.persist_queue,
            restore_on_startup = features.restore_on_startup,
            "Core service started"
        );

        Ok(Self {
            coordinator,
            events,
            persister,
            hydration,
            features,
            tasks: Mutex::new(vec![session]),
        })
    }

    pub fn coordinator(&self) -> &Arc<QueueCoordinator> {
        &self.coordinator
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydration.is_complete()
    }

    /// Resolves once startup restore has finished, whatever its outcome.
    pub async fn wait_until_hydrated(&self) {
        self.hydration.wait().await;
    }

    /// Forward one engine callback to the coordinator.
    pub async fn handle_engine_event(&self, event: EngineEvent) -> Result<()> {
        self.coordinator.handle_engine_event(event).await?;
        Ok(())
    }

    /// Pump engine callbacks from `receiver` until the sender side closes.
    ///
    /// Handling failures are logged. Must be called from within a Tokio
    /// runtime.
    pub fn attach_engine_events(&self, mut receiver: mpsc::Receiver<EngineEvent>) {
        let coordinator = Arc::clone(&self.coordinator);
        let pump = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(e) = coordinator.handle_engine_event(event).await {
                    warn!(error = %e, "Engine event handling failed");
                }
            }
            debug!("Engine event channel closed");
        });
        self.tasks.lock().push(pump);
    }

    /// Stop background tasks and write the final session snapshot.
    ///
    /// Nothing is written before hydration finished, so an interrupted
    /// startup cannot overwrite the stored session with an empty one.
    pub async fn shutdown(&self) -> Result<()> {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.abort();
        }

        if self.features.persist_queue && self.hydration.is_complete() {
            self.persister
                .save(&self.coordinator.persisted_state())
                .await?;
        }

        info!("Core service shut down");
        Ok(())
    }
}

impl Drop for CoreService {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("coordinator", &self.coordinator)
            .field("persister", &self.persister)
            .field("hydrated", &self.hydration.is_complete())
            .field("features", &self.features)
            .finish()
    }
}

/// Startup restore followed by autosave for the rest of the session.
async fn run_session(
    coordinator: Arc<QueueCoordinator>,
    rehydration: RehydrationController,
    persister: Arc<QueueStatePersister>,
    features: FeatureFlags,
) {
    if features.restore_on_startup {
        let outcome = rehydration.rehydrate(&coordinator).await;
        info!(?outcome, "Startup restore finished");
    } else {
        debug!("Session restore disabled");
        rehydration.skip(&coordinator);
    }

    if features.persist_queue {
        autosave::run(coordinator.subscribe(), persister).await;
    }
}
