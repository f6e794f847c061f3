//! Configuration storage adapters.
//!
//! - [`MemoryStore`]: namespaced key-value store in RAM implementing
//!   both [`StoragePort`] and [`ConfigPort`].  The configuration is kept
//!   as a `postcard` blob, the same bytes a flash backend would hold.
//! - [`JsonFileStore`]: [`ConfigPort`] over the administrative JSON file.
//!
//! Both validate before persisting.  Namespaces keep subsystems apart:
//! the config lives at `terrahub::config`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::ControllerConfig;

const CONFIG_NAMESPACE: &str = "terrahub";
const CONFIG_KEY: &str = "config";

/// Largest value a single key may hold.
pub const MAX_BLOB_SIZE: usize = 16 * 1024;

fn check_valid(config: &ControllerConfig) -> Result<(), ConfigError> {
    let report = config.validate();
    if let Some(first) = report.errors.first() {
        warn!("Store: refusing to save invalid config: {first}");
        return Err(ConfigError::ValidationFailed);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// In-memory store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::TooLarge);
        }
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }
}

impl ConfigPort for MemoryStore {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        match self.store.borrow().get(&key) {
            Some(bytes) => {
                let cfg: ControllerConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("Store: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("Store: no stored config, using defaults");
                Ok(ControllerConfig::default())
            }
        }
    }

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        check_valid(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)?;
        info!("Store: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for MemoryStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let store = self.store.borrow();
        let data = store
            .get(&Self::composite_key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        let dst = buf.get_mut(..data.len()).ok_or(StorageError::TooLarge)?;
        dst.copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&Self::composite_key(namespace, key))
    }
}

// ───────────────────────────────────────────────────────────────
// JSON file
// ───────────────────────────────────────────────────────────────

/// The configuration as a pretty-printed JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonFileStore {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Store: {} not found, using defaults", self.path.display());
                return Ok(ControllerConfig::default());
            }
            Err(e) => {
                warn!("Store: reading {} failed: {e}", self.path.display());
                return Err(ConfigError::IoError);
            }
        };
        ControllerConfig::from_json(&text).map_err(|e| {
            warn!("Store: {} is not a valid config: {e}", self.path.display());
            ConfigError::Corrupted
        })
    }

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        check_valid(config)?;
        let text = config.to_json_pretty().map_err(|_| ConfigError::IoError)?;

        // Write beside the target, then rename over it.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text.as_bytes())
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("Store: writing {} failed: {e}", self.path.display());
                ConfigError::IoError
            })?;
        info!("Store: config written to {}", self.path.display());
        Ok(())
    }
}
