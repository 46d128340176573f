//! Thread-safety bound shared by the host capability traits.
//!
//! The coordinator keeps its engine, library and locator behind `Arc<dyn _>`
//! and drives them from Tokio tasks, so native adapters must be `Send + Sync`.
//! Browser hosts wrap single-threaded JS objects and cannot promise that;
//! there the bound disappears and the traits use `async_trait(?Send)`.

/// `Send + Sync` on native targets, no bound at all on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}
