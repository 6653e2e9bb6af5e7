//! TOML state files

use super::Backend;
use crate::document::StoredDocument;
use crate::error::StorageError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads and writes `Entity.<uuid>.toml`
pub struct TomlBackend {
    path: PathBuf,
}

impl TomlBackend {
    pub const NAME: &'static str = "toml";
    pub const EXTENSION: &'static str = "toml";

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Registry constructor.
    pub fn open(path: &Path) -> Arc<dyn Backend> {
        Arc::new(Self::new(path))
    }
}

impl Backend for TomlBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, doc: &StoredDocument) -> Result<Vec<u8>, StorageError> {
        ::toml::to_string(doc)
            .map(String::into_bytes)
            .map_err(|e| StorageError::Encode {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredDocument, StorageError> {
        let text = std::str::from_utf8(bytes).map_err(|e| StorageError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        ::toml::from_str(text).map_err(|e| StorageError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
