//! JSON state files

use super::Backend;
use crate::document::StoredDocument;
use crate::error::StorageError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads and writes `Entity.<uuid>.json`
pub struct JsonBackend {
    path: PathBuf,
}

impl JsonBackend {
    pub const NAME: &'static str = "json";
    pub const EXTENSION: &'static str = "json";

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

impl Backend for JsonBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, doc: &StoredDocument) -> Result<Vec<u8>, StorageError> {
        serde_json::to_vec_pretty(doc).map_err(|e| StorageError::Encode {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredDocument, StorageError> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
