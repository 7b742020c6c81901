//! Key-value settings area and session flags, both outside the database.
//!
//! [`SettingsStore`] is a small JSON file for durable markers and app-level
//! preferences; the data-migration marker lives here so it survives physical
//! schema version bumps independently. [`SessionFlags`] are marker files that
//! signal an intent across one restart and are consumed on read.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::StoreError;

#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| StoreError::Codec {
                collection: "settings",
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    // Write-to-temp then rename, so a crash never leaves a torn file.
    fn write_map(&self, map: &BTreeMap<String, serde_json::Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }
        let text = serde_json::to_string_pretty(map).map_err(|e| StoreError::Codec {
            collection: "settings",
            source: e,
        })?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, text).map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let map = self.read_map()?;
        match map.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| StoreError::Codec {
                    collection: "settings",
                    source: e,
                }),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        let value = serde_json::to_value(value).map_err(|e| StoreError::Codec {
            collection: "settings",
            source: e,
        })?;
        map.insert(key.to_owned(), value);
        self.write_map(&map)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// Short-lived cross-restart markers, one file per flag.
#[derive(Clone)]
pub struct SessionFlags {
    dir: PathBuf,
}

impl SessionFlags {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn set(&self, flag: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = self.dir.join(flag);
        std::fs::write(&path, b"1").map_err(|e| StoreError::Io { path, source: e })
    }

    /// Consume the flag: report whether it was set and clear it either way.
    pub fn take(&self, flag: &str) -> Result<bool, StoreError> {
        let path = self.dir.join(flag);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }
}
