//! Storage backends for the session record.
//!
//! A backend is a flat string key/value map with atomic batch writes and a
//! push-based storage-change signal. Several `SessionStore` handles may share
//! one backend; each batch is stamped with the writing handle's id so the
//! writer can ignore its own echo, the way browser storage events only fire
//! in other tabs.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Set(String, String),
    Remove(String),
}

/// Storage-change signal; `origin` is the id of the handle that wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSignal {
    pub origin: u64,
}

pub trait SessionBackend: Send + Sync {
    /// Read several keys under one lock so the result is never torn.
    fn read(&self, keys: &[&str]) -> Vec<Option<String>>;

    /// Apply a batch atomically, then signal every subscriber.
    fn apply(&self, origin: u64, changes: &[Change]) -> ApiResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<StorageSignal>;

    fn get(&self, key: &str) -> Option<String> {
        self.read(&[key]).pop().flatten()
    }
}

fn apply_to_map(map: &mut HashMap<String, String>, changes: &[Change]) {
    for c in changes {
        match c {
            Change::Set(k, v) => { map.insert(k.clone(), v.clone()); }
            Change::Remove(k) => { map.remove(k); }
        }
    }
}

pub struct MemoryBackend {
    map: RwLock<HashMap<String, String>>,
    signal: broadcast::Sender<StorageSignal>,
}

static PROCESS_STORAGE: Lazy<Arc<MemoryBackend>> = Lazy::new(|| Arc::new(MemoryBackend::new()));

impl MemoryBackend {
    pub fn new() -> Self {
        let (signal, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { map: RwLock::new(HashMap::new()), signal }
    }

    /// One storage shared by every handle in the process.
    pub fn process_shared() -> Arc<MemoryBackend> {
        PROCESS_STORAGE.clone()
    }

    /// Overwrite a single key without going through a session handle.
    /// Handy for simulating tampered or externally edited storage.
    pub fn poke(&self, key: &str, value: Option<&str>) {
        let mut m = self.map.write();
        match value {
            Some(v) => { m.insert(key.to_string(), v.to_string()); }
            None => { m.remove(key); }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self { Self::new() }
}

impl SessionBackend for MemoryBackend {
    fn read(&self, keys: &[&str]) -> Vec<Option<String>> {
        let m = self.map.read();
        keys.iter().map(|k| m.get(*k).cloned()).collect()
    }

    fn apply(&self, origin: u64, changes: &[Change]) -> ApiResult<()> {
        {
            let mut m = self.map.write();
            apply_to_map(&mut m, changes);
        }
        let _ = self.signal.send(StorageSignal { origin });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageSignal> {
        self.signal.subscribe()
    }
}

/// JSON file persisted session. The on-disk file is rewritten as a whole on
/// every batch (temp file + rename); an empty record removes the file.
pub struct FileBackend {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
    signal: broadcast::Sender<StorageSignal>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref().to_path_buf();
        let map = load_file(&path)?;
        debug!(target: "session", "file backend opened path={:?} keys={}", path, map.len());
        let (signal, _) = broadcast::channel(SIGNAL_CAPACITY);
        Ok(Self { path, cache: RwLock::new(map), signal })
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Re-read the file, picking up writes made by another process.
    pub fn reload(&self) -> ApiResult<()> {
        let map = load_file(&self.path)?;
        *self.cache.write() = map;
        let _ = self.signal.send(StorageSignal { origin: 0 });
        Ok(())
    }
}

fn load_file(path: &Path) -> ApiResult<HashMap<String, String>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(ApiError::storage(format!("read {:?}: {}", path, e))),
    };
    match serde_json::from_str::<HashMap<String, String>>(&text) {
        Ok(m) => Ok(m),
        Err(e) => {
            warn!(target: "session", "ignoring unreadable session file {:?}: {}", path, e);
            Ok(HashMap::new())
        }
    }
}

fn write_file(path: &Path, map: &HashMap<String, String>) -> ApiResult<()> {
    if map.is_empty() {
        return match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::storage(format!("remove {:?}: {}", path, e))),
        };
    }
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ApiError::storage(format!("create {:?}: {}", dir, e)))?;
    let body = serde_json::to_string_pretty(map)?;

    // Fresh temp file per write; the record holds the refresh token so it is owner-only.
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ApiError::storage(format!("temp file in {:?}: {}", dir, e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| ApiError::storage(format!("chmod {:?}: {}", tmp.path(), e)))?;
    }
    tmp.write_all(body.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ApiError::storage(format!("write {:?}: {}", tmp.path(), e)))?;
    tmp.persist(path).map_err(|e| ApiError::storage(format!("persist {:?}: {}", path, e.error)))?;
    Ok(())
}

impl SessionBackend for FileBackend {
    fn read(&self, keys: &[&str]) -> Vec<Option<String>> {
        let m = self.cache.read();
        keys.iter().map(|k| m.get(*k).cloned()).collect()
    }

    fn apply(&self, origin: u64, changes: &[Change]) -> ApiResult<()> {
        {
            let mut m = self.cache.write();
            let mut next = m.clone();
            apply_to_map(&mut next, changes);
            write_file(&self.path, &next)?;
            *m = next;
        }
        let _ = self.signal.send(StorageSignal { origin });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageSignal> {
        self.signal.subscribe()
    }
}
