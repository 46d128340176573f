//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` backed by a JSON document in the application data
//!   directory ([`JsonFileSettingsStore`])
//! - `SettingsStore` kept purely in memory ([`InMemorySettingsStore`]) for
//!   ephemeral sessions and tests
//!
//! The audio engine, song library, and media locator are supplied by the host
//! application itself; there is no generic desktop default for them.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::JsonFileSettingsStore;
//! use bridge_traits::SettingsStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = JsonFileSettingsStore::in_default_location("my-player");
//!     store.set_string("player-storage", "{}").await.unwrap();
//! }
//! ```

mod settings;

pub use settings::{InMemorySettingsStore, JsonFileSettingsStore};
