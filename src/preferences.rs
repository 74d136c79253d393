use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::i18n::LanguageCode;

/// Storage key for the selected target language
pub const LANGUAGE_STORAGE_KEY: &str = "@offsight:selected_language";

/// Durable holder of the selected language.
///
/// `get` on a fresh install returns `Ok(None)`. `set` overwrites; setting the
/// same code twice is a no-op from the caller's point of view. Callers are
/// sequenced by the UI, so implementations need no cross-call locking beyond
/// what keeps a single write consistent.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self) -> Result<Option<LanguageCode>, StorageError>;
    async fn set(&self, code: &LanguageCode) -> Result<(), StorageError>;
}

/// Preferences kept in a JSON object file, keyed like the mobile app's
/// key-value storage.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    async fn read_all(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.display_path(),
                    source,
                })
            }
        };

        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: self.display_path(),
            source,
        })
    }

    async fn write_all(&self, entries: &Map<String, Value>) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            path: self.display_path(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let body = serde_json::to_vec_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: self.display_path(),
            source,
        })?;

        // Write next to the target then rename, so readers never see a partial file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self) -> Result<Option<LanguageCode>, StorageError> {
        let entries = self.read_all().await?;
        Ok(entries
            .get(LANGUAGE_STORAGE_KEY)
            .and_then(Value::as_str)
            .map(LanguageCode::new))
    }

    async fn set(&self, code: &LanguageCode) -> Result<(), StorageError> {
        let mut entries = match self.read_all().await {
            Ok(entries) => entries,
            Err(e @ StorageError::Corrupt { .. }) => {
                warn!("{}; replacing it with a fresh file", e);
                Map::new()
            }
            Err(e) => return Err(e),
        };
        if entries.get(LANGUAGE_STORAGE_KEY).and_then(Value::as_str) == Some(code.as_str()) {
            debug!("Language preference already {}, skipping write", code);
            return Ok(());
        }
        entries.insert(
            LANGUAGE_STORAGE_KEY.to_string(),
            Value::String(code.as_str().to_string()),
        );
        self.write_all(&entries).await?;
        debug!("Saved language preference {} to {}", code, self.display_path());
        Ok(())
    }
}

/// In-process store, for tests and sessions that should not touch disk.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a selection, as after an earlier session.
    pub fn with_language(code: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(LANGUAGE_STORAGE_KEY.to_string(), code.to_string());
        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self) -> Result<Option<LanguageCode>, StorageError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(LANGUAGE_STORAGE_KEY).map(LanguageCode::new))
    }

    async fn set(&self, code: &LanguageCode) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(LANGUAGE_STORAGE_KEY.to_string(), code.as_str().to_string());
        Ok(())
    }
}

/// Load the saved language, treating storage failures as "no preference".
pub async fn load_selected_language(store: &dyn PreferenceStore) -> Option<LanguageCode> {
    match store.get().await {
        Ok(code) => code,
        Err(e) => {
            warn!("Error getting selected language, continuing without one: {}", e);
            None
        }
    }
}

/// Save the selected language. Returns whether it was persisted; a failed
/// write is logged and otherwise ignored.
pub async fn save_selected_language(store: &dyn PreferenceStore, code: &LanguageCode) -> bool {
    match store.set(code).await {
        Ok(()) => true,
        Err(e) => {
            warn!("StorageWriteFailed: language preference {} not saved: {}", code, e);
            false
        }
    }
}
