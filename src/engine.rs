// ============================================================================
// ENGINE — handle-keyed edit sessions plus result storage
// ============================================================================
//
// Each uploaded image gets its own EditSession behind its own lock, so
// concurrent users never share an original or a preview. Previews are
// stored losslessly under `<handle>/adjusted_<stem>.png`; saves copy those
// bytes to a caller-chosen name outside every session namespace.
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::PixelBuffer;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::io::{SaveFormat, decode_image};
use crate::request::AdjustRequest;
use crate::session::{EditSession, SessionState, render};
use crate::store::{DirStore, MemoryStore, ResultStore};
use crate::{log_err, log_info, log_warn};

/// Identifies one loaded image (one [`EditSession`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(Uuid);

impl ImageHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ImageHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The stored preview produced by the latest [`Engine::adjust`] call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PreviewHandle {
    session: ImageHandle,
    key: String,
}

impl PreviewHandle {
    pub fn session(&self) -> ImageHandle {
        self.session
    }

    /// Store name of the preview bytes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The key without its `<handle>/` namespace.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// A saved artifact.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoredHandle {
    key: String,
}

impl StoredHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Make an uploaded file name safe to use as a store key: ASCII
/// alphanumerics plus `.`, `-`, `_`; whitespace becomes `_`; leading dots are
/// stripped. Falls back to `"image"`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim_matches('_');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

pub struct Engine {
    config: EngineConfig,
    sessions: RwLock<HashMap<ImageHandle, Arc<Mutex<EditSession>>>>,
    store: Arc<dyn ResultStore>,
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<dyn ResultStore>) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Engine with a process-local store.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// Engine storing results as files under `config.store_dir`.
    pub fn with_dir_store(config: EngineConfig) -> Result<Self> {
        let store = DirStore::open(config.store_dir.clone())?;
        Ok(Self::new(config, Arc::new(store)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ResultStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Decode `bytes` and open a new session for it.
    pub fn load_image(&self, bytes: &[u8], filename: &str) -> Result<ImageHandle> {
        let buffer = decode_image(bytes, self.config.decode_limits()).inspect_err(|e| {
            log_warn!("Rejected upload '{}': {}", filename, e);
        })?;
        Ok(self.load_buffer(buffer, filename))
    }

    /// Open a new session for an already-decoded buffer.
    pub fn load_buffer(&self, buffer: PixelBuffer, filename: &str) -> ImageHandle {
        let handle = ImageHandle::new();
        let name = sanitize_filename(filename);
        log_info!(
            "Loaded {} ({}x{}) as session {}",
            name,
            buffer.width(),
            buffer.height(),
            handle
        );
        let session = EditSession::with_image(name, buffer);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, Arc::new(Mutex::new(session)));
        handle
    }

    /// Swap the image of an existing session. Its stored previews are dropped.
    pub fn replace_image(&self, handle: ImageHandle, bytes: &[u8], filename: &str) -> Result<()> {
        let buffer = decode_image(bytes, self.config.decode_limits())?;
        let session = self.session(handle)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        session.load(sanitize_filename(filename), buffer);
        self.store.clear_namespace(&handle.to_string())?;
        log_info!("Replaced image of session {}", handle);
        Ok(())
    }

    /// Drop a session and everything stored under its namespace.
    pub fn close(&self, handle: ImageHandle) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        if removed.is_none() {
            return Err(EngineError::NoImage);
        }
        let cleared = self.store.clear_namespace(&handle.to_string())?;
        log_info!("Closed session {} ({} stored previews removed)", handle, cleared);
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn session_state(&self, handle: ImageHandle) -> SessionState {
        let Ok(session) = self.session(handle) else {
            return SessionState::Empty;
        };
        let state = session.lock().unwrap_or_else(PoisonError::into_inner).state();
        state
    }

    fn session(&self, handle: ImageHandle) -> Result<Arc<Mutex<EditSession>>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned()
            .ok_or(EngineError::NoImage)
    }

    // ------------------------------------------------------------------------
    // Adjust / preview
    // ------------------------------------------------------------------------

    /// Adjust the session's original and store the encoded preview.
    ///
    /// Each call starts from the original image. The session only records
    /// the result once its preview is stored, so on any error the previous
    /// preview stays in place both in the session and in the store.
    pub fn adjust(&self, handle: ImageHandle, request: &AdjustRequest) -> Result<PreviewHandle> {
        request.validate(self.config.offset_limit)?;
        let session = self.session(handle)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);

        let (original, generation) = session.snapshot()?;
        let result = render(&original, request.offsets(), request.region).inspect_err(|e| {
            log_warn!("Adjust rejected for session {}: {}", handle, e);
        })?;
        let preview = self.store_preview(handle, &session, &result).inspect_err(|e| {
            log_err!("Storing preview of session {} failed: {}", handle, e);
        })?;
        session.commit(generation, Arc::new(result));
        log_info!(
            "Adjusted session {}: {:?} region {:?}",
            handle,
            request.offsets(),
            request.region
        );
        Ok(preview)
    }

    /// Return the session to the unadjusted original and store that preview.
    pub fn reset(&self, handle: ImageHandle) -> Result<PreviewHandle> {
        let session = self.session(handle)?;
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let (original, generation) = session.snapshot()?;
        let preview = self.store_preview(handle, &session, &original)?;
        session.commit(generation, original);
        log_info!("Reset session {}", handle);
        Ok(preview)
    }

    /// The latest preview buffer of a session.
    pub fn preview(&self, handle: ImageHandle) -> Result<Arc<PixelBuffer>> {
        let session = self.session(handle)?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        session
            .last_adjusted()
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("{}/preview", handle)))
    }

    /// Previews must decode back to exactly the adjusted samples, so a lossy
    /// configured format falls back to PNG.
    fn preview_format(&self) -> SaveFormat {
        if self.config.default_format.is_lossless() {
            self.config.default_format
        } else {
            SaveFormat::Png
        }
    }

    /// `<handle>/adjusted_<stem>.<ext>`, the extension matching the bytes.
    fn preview_key(&self, handle: ImageHandle, session: &EditSession) -> String {
        let stem = session
            .image_name()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or("image");
        format!(
            "{}/{}{}.{}",
            handle,
            self.config.adjusted_prefix,
            stem,
            self.preview_format().extension()
        )
    }

    fn store_preview(&self, handle: ImageHandle, session: &EditSession, result: &PixelBuffer) -> Result<PreviewHandle> {
        let key = self.preview_key(handle, session);
        self.store.put(&key, result, self.preview_format(), self.config.jpeg_quality)?;
        Ok(PreviewHandle { session: handle, key })
    }

    // ------------------------------------------------------------------------
    // Save / fetch
    // ------------------------------------------------------------------------

    /// Copy the stored preview bytes to `name`, byte for byte.
    ///
    /// `name` may not start with a session handle: those namespaces belong
    /// to the engine's previews.
    pub fn save_result(&self, preview: &PreviewHandle, name: &str) -> Result<StoredHandle> {
        let first = name.split('/').next().unwrap_or_default();
        if first.parse::<ImageHandle>().is_ok() {
            return Err(EngineError::ReservedName(name.to_string()));
        }
        self.store.copy(&preview.key, name).inspect_err(|e| {
            log_warn!("Save of {} failed: {}", preview.key, e);
        })?;
        log_info!("Saved {} -> {}", preview.key, name);
        Ok(StoredHandle { key: name.to_string() })
    }

    /// Save under the configured name (`saved_image.png` by default).
    pub fn save(&self, preview: &PreviewHandle) -> Result<StoredHandle> {
        self.save_result(preview, &self.config.saved_name)
    }

    /// Save whatever the session last produced. Fails with `NotFound` when
    /// nothing has been adjusted yet.
    pub fn save_latest(&self, handle: ImageHandle, name: &str) -> Result<StoredHandle> {
        let session = self.session(handle)?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let key = self.preview_key(handle, &session);
        if session.last_adjusted().is_none() || !self.store.contains(&key) {
            return Err(EngineError::NotFound(key));
        }
        let preview = PreviewHandle { session: handle, key };
        self.save_result(&preview, name)
    }

    /// Bytes of a preview or saved artifact by store name.
    pub fn fetch_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.store.get(key)
    }
}
