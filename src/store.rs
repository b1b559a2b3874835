//! Named result storage.
//!
//! A [`ResultStore`] maps logical names (`"adjusted_cat.png"`,
//! `"saved_image.png"`, …) to encoded image bytes. Writes replace the whole
//! value in one step: readers see either the old bytes or the new ones,
//! never a mix. `copy` duplicates stored bytes verbatim, without decoding.
//!
//! Names may contain `/` to group entries under a namespace (the engine
//! keeps each session's previews under `<handle>/`).

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use uuid::Uuid;

use crate::buffer::PixelBuffer;
use crate::error::{EngineError, Result};
use crate::io::{SaveFormat, encode_image};

pub trait ResultStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous value.
    fn put_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch the bytes stored under `name`.
    fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Duplicate the bytes under `from` to `to`, replacing `to`.
    fn copy(&self, from: &str, to: &str) -> Result<()>;

    fn contains(&self, name: &str) -> bool;

    /// Remove `name`. Returns whether anything was removed.
    fn remove(&self, name: &str) -> Result<bool>;

    /// Remove every entry stored under `namespace/`. Returns the count removed.
    fn clear_namespace(&self, namespace: &str) -> Result<usize>;

    /// Encode `buffer` and store it under `name`. Encoding happens first, so
    /// an encode failure leaves the existing value untouched.
    fn put(&self, name: &str, buffer: &PixelBuffer, format: SaveFormat, quality: u8) -> Result<()> {
        let bytes = encode_image(buffer, format, quality)?;
        self.put_bytes(name, bytes)
    }
}

fn check_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let clean = !name.is_empty()
        && !name.contains('\\')
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if clean {
        Ok(())
    } else {
        Err(EngineError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("invalid store name '{}'", name),
        )))
    }
}

fn namespace_prefix(namespace: &str) -> String {
    format!("{}/", namespace.trim_end_matches('/'))
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Process-local store. Values are shared slices, so `copy` is a pointer
/// clone of the exact same bytes.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryStore {
    fn put_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        check_name(name)?;
        let value: Arc<[u8]> = bytes.into();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|v| v.to_vec())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        check_name(to)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let value = entries
            .get(from)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(from.to_string()))?;
        entries.insert(to.to_string(), value);
        Ok(())
    }

    fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some())
    }

    fn clear_namespace(&self, namespace: &str) -> Result<usize> {
        let prefix = namespace_prefix(namespace);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(&prefix));
        Ok(before - entries.len())
    }
}

// ============================================================================
// DIRECTORY STORE
// ============================================================================

/// Store backed by files under a root directory (`static/uploads` in the
/// web deployment). Each write goes to a temporary sibling file which is then
/// renamed over the target.
pub struct DirStore {
    root: PathBuf,
    /// Serialises writers; readers go straight to the filesystem.
    write_lock: Mutex<()>,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        Ok(self.root.join(name))
    }

    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_name = target
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = target.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, target) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl ResultStore for DirStore {
    fn put_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.path_of(name)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_atomic(&target, &bytes)
    }

    fn get(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(EngineError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        let target = self.path_of(to)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = self.get(from)?;
        self.write_atomic(&target, &bytes)
    }

    fn contains(&self, name: &str) -> bool {
        self.path_of(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_namespace(&self, namespace: &str) -> Result<usize> {
        let dir = self.path_of(namespace.trim_end_matches('/'))?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !dir.is_dir() {
            return Ok(0);
        }
        let count = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .count();
        fs::remove_dir_all(&dir)?;
        Ok(count)
    }
}
