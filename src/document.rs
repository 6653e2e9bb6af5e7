//! Logical state document shared by every backend.
//!
//! A document has two fields: `tags`, an ordered list of unique strings, and
//! `categories`, a mapping of string keys to scalar values. Backends translate
//! this shape to and from their own encoding.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Category mapping as persisted.
pub type CategoryMap = BTreeMap<String, Scalar>;

/// Scalar category value
///
/// Serialized untagged so JSON, YAML and TOML files hold plain values.
/// Variant order matters for untagged decoding: bools before ints before floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Name of the variant's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Str(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) => Some(*f),
            Scalar::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Parse a command-line style literal: `true`/`false`, integers, floats,
    /// anything else is a string.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "true" => return Scalar::Bool(true),
            "false" => return Scalar::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Scalar::Float(f);
            }
        }
        Scalar::Str(raw.to_string())
    }
}

// Floats compare by bit pattern so scalars can key group maps.
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Bool(b) => b.hash(state),
            Scalar::Int(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{:?}", x),
            Scalar::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

/// Complete state of one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub tags: Vec<String>,
    pub categories: CategoryMap,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical equality: same tag set, same category mapping. Tag order is
    /// not significant.
    pub fn logically_eq(&self, other: &Document) -> bool {
        let mut a: Vec<&String> = self.tags.iter().collect();
        let mut b: Vec<&String> = other.tags.iter().collect();
        a.sort();
        b.sort();
        a == b && self.categories == other.categories
    }
}

/// Document as found on disk, before required fields are checked.
///
/// A field that was never written decodes as `None`, which is different from
/// an empty list or mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategoryMap>,
}

impl StoredDocument {
    /// First required field that is absent, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.tags.is_none() {
            Some("tags")
        } else if self.categories.is_none() {
            Some("categories")
        } else {
            None
        }
    }

    /// Promote to a complete document, failing on the first absent field.
    pub fn into_document(self, path: &Path) -> Result<Document, StorageError> {
        if let Some(field) = self.missing_field() {
            return Err(StorageError::MissingField {
                path: path.to_path_buf(),
                field,
            });
        }
        Ok(Document {
            tags: self.tags.unwrap_or_default(),
            categories: self.categories.unwrap_or_default(),
        })
    }

    /// Fill absent fields with empty defaults.
    pub fn completed(self) -> Document {
        Document {
            tags: self.tags.unwrap_or_default(),
            categories: self.categories.unwrap_or_default(),
        }
    }
}

impl From<&Document> for StoredDocument {
    fn from(doc: &Document) -> Self {
        Self {
            tags: Some(doc.tags.clone()),
            categories: Some(doc.categories.clone()),
        }
    }
}
