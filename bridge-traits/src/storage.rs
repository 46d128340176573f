//! Settings storage abstraction.
//!
//! The queue core persists a small JSON snapshot of the playback session
//! through this trait. Hosts map it onto whatever key-value facility the
//! platform provides.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences/settings storage:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: JSON file in the application data directory
/// - Web: localStorage / IndexedDB
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preference(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("theme", "dark").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        pub Store {}

        #[async_trait]
        impl SettingsStore for Store {
            async fn set_string(&self, key: &str, value: &str) -> Result<()>;
            async fn get_string(&self, key: &str) -> Result<Option<String>>;
            async fn delete(&self, key: &str) -> Result<()>;
            async fn list_keys(&self) -> Result<Vec<String>>;
        }
    }

    #[tokio::test]
    async fn has_key_defaults_to_get_string() {
        let mut store = MockStore::new();
        store
            .expect_get_string()
            .withf(|key| key == "present")
            .returning(|_| Ok(Some("value".to_string())));
        store
            .expect_get_string()
            .withf(|key| key == "absent")
            .returning(|_| Ok(None));

        assert!(store.has_key("present").await.unwrap());
        assert!(!store.has_key("absent").await.unwrap());
    }
}
