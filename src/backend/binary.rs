//! Binary table state files
//!
//! Layout: a 4-byte magic, a format version byte, then a bincode-encoded set
//! of tables. Tags are one column of strings; categories are rows of
//! `(key, typed cell)`. Unlike the text formats, cells carry an explicit type
//! tag so ints and floats never need to be guessed back.

use super::Backend;
use crate::document::{CategoryMap, Scalar, StoredDocument};
use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAGIC: &[u8; 4] = b"GRVT";
const FORMAT_VERSION: u8 = 1;

/// Typed category cell
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Cell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryRow {
    key: String,
    value: Cell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tables {
    tags: Option<Vec<String>>,
    categories: Option<Vec<CategoryRow>>,
}

impl From<&Scalar> for Cell {
    fn from(value: &Scalar) -> Self {
        match value {
            Scalar::Bool(b) => Cell::Bool(*b),
            Scalar::Int(i) => Cell::Int(*i),
            Scalar::Float(f) => Cell::Float(*f),
            Scalar::Str(s) => Cell::Str(s.clone()),
        }
    }
}

impl From<Cell> for Scalar {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Bool(b) => Scalar::Bool(b),
            Cell::Int(i) => Scalar::Int(i),
            Cell::Float(f) => Scalar::Float(f),
            Cell::Str(s) => Scalar::Str(s),
        }
    }
}

/// Reads and writes `Entity.<uuid>.bin`
pub struct BinaryBackend {
    path: PathBuf,
}

impl BinaryBackend {
    pub const NAME: &'static str = "binary";
    pub const EXTENSION: &'static str = "bin";

    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Registry constructor.
    pub fn open(path: &Path) -> Arc<dyn Backend> {
        Arc::new(Self::new(path))
    }

    fn decode_error(&self, message: impl Into<String>) -> StorageError {
        StorageError::Decode {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl Backend for BinaryBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, doc: &StoredDocument) -> Result<Vec<u8>, StorageError> {
        let tables = Tables {
            tags: doc.tags.clone(),
            categories: doc.categories.as_ref().map(|map| {
                map.iter()
                    .map(|(key, value)| CategoryRow {
                        key: key.clone(),
                        value: Cell::from(value),
                    })
                    .collect()
            }),
        };

        let body = bincode::serialize(&tables).map_err(|e| StorageError::Encode {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + 1 + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredDocument, StorageError> {
        if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(self.decode_error("not a grove binary state file"));
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(self.decode_error(format!("unsupported format version {}", version)));
        }

        let tables: Tables = bincode::deserialize(&bytes[MAGIC.len() + 1..])
            .map_err(|e| self.decode_error(e.to_string()))?;

        Ok(StoredDocument {
            tags: tables.tags,
            categories: tables.categories.map(|rows| {
                rows.into_iter()
                    .map(|row| (row.key, Scalar::from(row.value)))
                    .collect::<CategoryMap>()
            }),
        })
    }
}
