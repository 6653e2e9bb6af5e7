//! YAML state files

use super::Backend;
use crate::document::StoredDocument;
use crate::error::StorageError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads and writes `Entity.<uuid>.yml`
pub struct YamlBackend {
    path: PathBuf,
}

impl YamlBackend {
    pub const NAME: &'static str = "yaml";
    pub const EXTENSION: &'static str = "yml";

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

impl Backend for YamlBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, doc: &StoredDocument) -> Result<Vec<u8>, StorageError> {
        serde_yaml::to_string(doc)
            .map(String::into_bytes)
            .map_err(|e| StorageError::Encode {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredDocument, StorageError> {
        // An empty file decodes as a document with no fields
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(StoredDocument::default());
        }
        serde_yaml::from_slice(bytes).map_err(|e| StorageError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
