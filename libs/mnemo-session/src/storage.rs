//! Pluggable key-value storage for the local session cache.
//!
//! The session layer never talks to a concrete store directly: it goes
//! through one [`StorageBackend`] selected at construction time by probing
//! an ordered fallback chain (e.g. per-tab store, then per-origin store,
//! then memory). Detection happens exactly once, not per call.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("storage I/O failed: {0}")]
    Io(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Minimal capability surface every cache tier provides.
pub trait StorageBackend: Send {
    /// Identifier used in logs when this tier is selected or skipped.
    fn name(&self) -> &'static str;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// In-memory tier; always available, used as the last resort.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear();
        Ok(())
    }
}

const PROBE_KEY: &str = "__mnemo_probe";

/// Pick the first backend in the chain that survives a write/read/remove
/// probe. Falls back to [`MemoryBackend`] when the whole chain fails.
pub fn select_backend(candidates: Vec<Box<dyn StorageBackend>>) -> Box<dyn StorageBackend> {
    for mut candidate in candidates {
        match probe(candidate.as_mut()) {
            Ok(()) => {
                debug!(backend = candidate.name(), "selected storage backend");
                return candidate;
            }
            Err(err) => {
                warn!(backend = candidate.name(), %err, "storage tier failed probe, falling back");
            }
        }
    }
    warn!("no storage tier passed its probe, sessions will not survive a reload");
    Box::new(MemoryBackend::new())
}

fn probe(backend: &mut dyn StorageBackend) -> Result<(), StorageError> {
    backend.set(PROBE_KEY, "ok")?;
    let read = backend.get(PROBE_KEY)?;
    backend.remove(PROBE_KEY)?;
    if read.as_deref() == Some("ok") {
        Ok(())
    } else {
        Err(StorageError::Unavailable("probe readback mismatch".to_string()))
    }
}
