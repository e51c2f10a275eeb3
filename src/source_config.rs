//! Per-source configuration: declared keys, resolution and storage.
//!
//! Parsers declare the keys they need (at least the domain). Values are
//! resolved through a [`SourceConfig`] handle, which reads the injected
//! [`ConfigStore`] and falls back to the key's default. Handles are created
//! lazily, once per source, by a [`ConfigRegistry`] owned by the caller.

use crate::error::ConfigError;
use crate::model::Source;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Store key of the domain option.
pub const DOMAIN_KEY: &str = "domain";

/// Default domain of a source plus known mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainKey {
    default: String,
    presets: Vec<String>,
}

impl DomainKey {
    pub fn new(default: &str) -> Self {
        Self {
            default: default.to_string(),
            presets: Vec::new(),
        }
    }

    /// Creates a key with alternative domains the user can pick from.
    pub fn with_presets(default: &str, presets: &[&str]) -> Self {
        Self {
            default: default.to_string(),
            presets: presets.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn default_domain(&self) -> &str {
        &self.default
    }

    /// Alternative domains, not including the default.
    pub fn presets(&self) -> &[String] {
        &self.presets
    }
}

/// A configurable option declared by a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKey {
    /// The domain every request is sent to.
    Domain(DomainKey),

    /// A free-form string option.
    Text {
        name: &'static str,
        default: Option<String>,
    },
}

impl ConfigKey {
    /// Key under which the value is stored.
    pub fn name(&self) -> &str {
        match self {
            ConfigKey::Domain(_) => DOMAIN_KEY,
            ConfigKey::Text { name, .. } => name,
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        match self {
            ConfigKey::Domain(key) => Some(key.default_domain()),
            ConfigKey::Text { default, .. } => default.as_deref(),
        }
    }
}

/// Persisted per-source key/value storage.
pub trait ConfigStore: Send + Sync {
    /// Returns the stored value, if any.
    fn get(&self, source: Source, key: &str) -> Option<String>;

    /// Stores a value, or clears it when `value` is `None`.
    fn set(&self, source: Source, key: &str, value: Option<&str>) -> Result<(), ConfigError>;
}

/// Store kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<(Source, String), String>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, source: Source, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(&(source, key.to_string())).cloned()
    }

    fn set(&self, source: Source, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        match value {
            Some(value) => values.insert((source, key.to_string()), value.to_string()),
            None => values.remove(&(source, key.to_string())),
        };
        Ok(())
    }
}

/// On-disk layout: one table per source name.
type SourceTables = BTreeMap<String, BTreeMap<String, String>>;

/// Store backed by a TOML file, written on every change.
///
/// ```toml
/// [YAOICHAN]
/// domain = "yaoi-chan.me"
/// ```
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    tables: RwLock<SourceTables>,
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct SourcesFile(SourceTables);

impl FileConfigStore {
    /// Opens a store, starting empty if the file doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let tables = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: SourcesFile =
                toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
            file.0
        } else {
            SourceTables::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            tables: RwLock::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, tables: &SourceTables) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&SourcesFile(tables.clone()))
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, source: Source, key: &str) -> Option<String> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(source.name())?.get(key).cloned()
    }

    fn set(&self, source: Source, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = tables.clone();
        match value {
            Some(value) => {
                updated
                    .entry(source.name().to_string())
                    .or_default()
                    .insert(key.to_string(), value.to_string());
            }
            None => {
                if let Some(table) = updated.get_mut(source.name()) {
                    table.remove(key);
                    if table.is_empty() {
                        updated.remove(source.name());
                    }
                }
            }
        }
        // Memory only changes once the file is written.
        self.save(&updated)?;
        *tables = updated;
        Ok(())
    }
}

/// Resolved configuration of one source.
pub struct SourceConfig {
    source: Source,
    store: Arc<dyn ConfigStore>,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl SourceConfig {
    pub fn source(&self) -> Source {
        self.source
    }

    /// Resolves a key: stored value first, then the key's default.
    pub fn get_text(&self, key: &ConfigKey) -> Result<String, ConfigError> {
        if let Some(value) = self.stored(key.name()) {
            return Ok(value);
        }
        key.default_value().map(str::to_string).ok_or_else(|| {
            ConfigError::MissingValue(format!("{}.{}", self.source.name(), key.name()))
        })
    }

    /// Resolves the active domain.
    pub fn domain(&self, key: &DomainKey) -> String {
        self.stored(DOMAIN_KEY)
            .unwrap_or_else(|| key.default_domain().to_string())
    }

    /// Overrides a key, or restores its default when `value` is `None`.
    pub fn set(&self, key: &ConfigKey, value: Option<&str>) -> Result<(), ConfigError> {
        self.store.set(self.source, key.name(), value)
    }

    /// Blank stored values count as unset.
    fn stored(&self, name: &str) -> Option<String> {
        self.store
            .get(self.source, name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Lazily creates and caches one [`SourceConfig`] per source.
pub struct ConfigRegistry {
    store: Arc<dyn ConfigStore>,
    configs: Mutex<HashMap<Source, Arc<SourceConfig>>>,
}

impl ConfigRegistry {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Registry over an in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryConfigStore::new()))
    }

    /// Returns the handle for `source`, creating it on first access.
    pub fn get_or_create(&self, source: Source) -> Arc<SourceConfig> {
        let mut configs = self.configs.lock().unwrap_or_else(|e| e.into_inner());
        configs
            .entry(source)
            .or_insert_with(|| {
                tracing::debug!("Creating config for {}", source.name());
                Arc::new(SourceConfig {
                    source,
                    store: Arc::clone(&self.store),
                })
            })
            .clone()
    }

    /// Drops the cached handle so the next access creates a fresh one.
    pub fn invalidate(&self, source: Source) {
        let mut configs = self.configs.lock().unwrap_or_else(|e| e.into_inner());
        configs.remove(&source);
    }
}
