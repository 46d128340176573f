//! Settings storage backed by a JSON file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const SETTINGS_FILE_NAME: &str = "settings.json";

/// JSON-file settings store implementation
///
/// The whole document is loaded lazily on first access and rewritten on every
/// mutation through a temporary file plus rename, so a crash mid-write never
/// leaves a truncated document behind.
pub struct JsonFileSettingsStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl JsonFileSettingsStore {
    /// Create a store persisting to `path`. Nothing is touched on disk until
    /// the first access.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Create a store under the platform data directory
    /// (e.g. `~/.local/share/<app_name>/settings.json`), falling back to the
    /// temp directory when the platform reports none.
    pub fn in_default_location(app_name: &str) -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self::new(base.join(app_name).join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(path: &Path) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).or_else(|e| {
                warn!(path = ?path, error = %e, "Settings file is corrupt, starting empty");
                Ok(BTreeMap::new())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn write_document(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| BridgeError::Serialization(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(BridgeError::Io)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(BridgeError::Io)?;

        debug!(path = ?self.path, keys = entries.len(), "Wrote settings file");
        Ok(())
    }

    /// Run `f` against the loaded document, loading it first if needed.
    async fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::read_document(&self.path).await?);
        }

        let entries = guard.get_or_insert_with(BTreeMap::new);
        let (value, dirty) = f(entries);
        if dirty {
            self.write_document(entries).await?;
        }
        Ok(value)
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            let changed = entries.get(key).map(String::as_str) != Some(value);
            if changed {
                entries.insert(key.to_string(), value.to_string());
            }
            ((), changed)
        })
        .await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| (entries.get(key).cloned(), false))
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| ((), entries.remove(key).is_some()))
            .await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.with_entries(|entries| (entries.keys().cloned().collect(), false))
            .await
    }
}

/// Settings store that never touches the disk.
#[derive(Default)]
pub struct InMemorySettingsStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}
