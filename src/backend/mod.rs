//! State file backends
//!
//! Each backend is a codec for one entity's [`Document`]. They all share the
//! same crash-consistent write path: encode to bytes, write a temporary
//! sibling, then rename it over the state file so a reader sees either the old
//! or the new document and never a mix.

pub mod binary;
pub mod json;
pub mod registry;
pub mod toml;
pub mod yaml;

pub use binary::BinaryBackend;
pub use json::JsonBackend;
pub use registry::{BackendFactory, BackendRegistry, BackendRegistryBuilder};
pub use self::toml::TomlBackend;
pub use yaml::YamlBackend;

use crate::document::{Document, StoredDocument};
use crate::error::StorageError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Codec for one entity's state file
pub trait Backend: Send + Sync {
    /// Registry name of this backend (e.g. `json`).
    fn name(&self) -> &'static str;

    /// Path of the state file this backend reads and writes.
    fn path(&self) -> &Path;

    /// Encode a stored document to bytes.
    fn encode(&self, doc: &StoredDocument) -> Result<Vec<u8>, StorageError>;

    /// Decode bytes into a stored document.
    fn decode(&self, bytes: &[u8]) -> Result<StoredDocument, StorageError>;

    /// Whether the state file exists.
    fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Read the document as stored, with absent fields left as `None`.
    fn load(&self) -> Result<StoredDocument, StorageError> {
        let path = self.path();
        let bytes = fs::read(path).map_err(|e| StorageError::from_io(path, e))?;
        self.decode(&bytes)
    }

    /// Read a complete document; fails if a required field is absent.
    fn read(&self) -> Result<Document, StorageError> {
        self.load()?.into_document(self.path())
    }

    /// Replace the persisted document.
    fn write(&self, doc: &Document) -> Result<(), StorageError> {
        let bytes = self.encode(&StoredDocument::from(doc))?;
        atomic_write(self.path(), &bytes)
    }

    /// Write `default` if no state file exists yet. Idempotent.
    fn create(&self, default: &Document) -> Result<(), StorageError> {
        if self.exists() {
            return Ok(());
        }
        self.write(default)
    }
}

/// Temporary sibling used while committing a write.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Write `bytes` to `path` through a temporary file and an atomic rename.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| StorageError::from_io(parent, e))?;
        }
    }

    let temp_path = temp_path_for(path);
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        // Clean up temp file on error
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::from_io(path, e));
    }

    tracing::trace!(path = %path.display(), bytes = bytes.len(), "Committed state file");
    Ok(())
}
