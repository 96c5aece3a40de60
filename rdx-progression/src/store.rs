//! Durable key/value storage for the engine.
//!
//! The engine treats storage as an opaque get/set/flush contract and only ever
//! touches keys under its own namespace, so the same store can hold unrelated
//! application preferences.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A string key/value store that survives process restarts once flushed.
pub trait StateStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str) -> Option<String>;
    /// Makes every pending `set`/`remove` durable.
    fn flush(&mut self) -> Result<()>;
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        (**self).remove(key)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// An in-process store. Nothing outlives the value itself.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `flush` has been called.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// A JSON file holding a flat string map.
///
/// `flush` writes the whole map to a sibling temp file, syncs it and renames
/// it over the original, so a crash mid-write leaves either the old or the new
/// file on disk and never a truncated one.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`, creating nothing until the first flush.
    ///
    /// An unreadable JSON document is logged and replaced by an empty map; it
    /// will be overwritten by the next flush.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store file: {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), %err, "Store file is corrupt; starting empty.");
                    BTreeMap::new()
                }
            }
        } else {
            debug!(path = %path.display(), "Store file does not exist yet.");
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize store")?;

        let temp_path = self.temp_path();
        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        temp_file
            .write_all(content.as_bytes())
            .context("Failed to write store content")?;
        temp_file.sync_all().context("Failed to sync store file")?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace store file: {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = self.entries.len(), "Store flushed.");
        Ok(())
    }
}
