//! services/client/src/adapters/kv_store.rs
//!
//! Concrete implementations of the `KeyValueStore` port: a JSON file on disk
//! that survives restarts, and a volatile in-memory map.

use compare_bot_core::ports::{KeyValueStore, KvOp, PortError, PortResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

type Entries = BTreeMap<String, String>;

fn apply_ops(entries: &mut Entries, ops: &[KvOp]) {
    for op in ops {
        match op {
            KvOp::Put { key, value } => {
                entries.insert(key.clone(), value.clone());
            }
            KvOp::Delete { key } => {
                entries.remove(key);
            }
        }
    }
}

fn storage(e: impl std::fmt::Display) -> PortError {
    PortError::Storage(e.to_string())
}

//=========================================================================================
// File-backed store
//=========================================================================================

/// Stores every entry in a single JSON object on disk.
///
/// Each batch is written to a sibling temp file and renamed over the
/// existing file, so a crash never leaves half a batch behind.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> PortResult<Entries> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(storage),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(storage(e)),
        }
    }

    fn write(&self, entries: &Entries) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(storage)?;
            }
        }
        let payload = serde_json::to_vec_pretty(entries).map_err(storage)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(storage)?;
        fs::rename(&tmp, &self.path).map_err(storage)?;
        debug!(path = %self.path.display(), entries = entries.len(), "key/value store written");
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn apply(&self, ops: &[KvOp]) -> PortResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PortError::Storage("store lock poisoned".to_string()))?;
        let mut entries = self.load()?;
        apply_ops(&mut entries, ops);
        self.write(&entries)
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

/// A volatile store; everything is gone when the process exits.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<Entries>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Storage("store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, ops: &[KvOp]) -> PortResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PortError::Storage("store lock poisoned".to_string()))?;
        apply_ops(&mut entries, ops);
        Ok(())
    }
}
