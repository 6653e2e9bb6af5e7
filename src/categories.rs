//! Categories: per-entity mapping of string keys to scalar values.

use crate::document::{CategoryMap, Scalar};
use crate::error::{json_type_name, ApiError};
use crate::guard::AccessGuard;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Category key as supplied by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryKey {
    Key(String),
    Invalid {
        value: String,
        actual_type: &'static str,
    },
}

impl CategoryKey {
    fn validate(self) -> Result<String, ApiError> {
        match self {
            CategoryKey::Key(key) if key.is_empty() => Err(ApiError::InvalidKeyType {
                value: "''".to_string(),
                actual_type: "empty string",
            }),
            CategoryKey::Key(key) => Ok(key),
            CategoryKey::Invalid { value, actual_type } => {
                Err(ApiError::InvalidKeyType { value, actual_type })
            }
        }
    }
}

impl From<&str> for CategoryKey {
    fn from(key: &str) -> Self {
        CategoryKey::Key(key.to_string())
    }
}

impl From<String> for CategoryKey {
    fn from(key: String) -> Self {
        CategoryKey::Key(key)
    }
}

impl From<&String> for CategoryKey {
    fn from(key: &String) -> Self {
        CategoryKey::Key(key.clone())
    }
}

impl From<serde_json::Value> for CategoryKey {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(key) => CategoryKey::Key(key),
            other => CategoryKey::Invalid {
                actual_type: json_type_name(&other),
                value: other.to_string(),
            },
        }
    }
}

/// Category value as supplied by a caller
///
/// `Keep` leaves any existing value for the key untouched and never creates
/// the key. It is not a removal.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryValue {
    Set(Scalar),
    Keep,
    Invalid {
        value: String,
        actual_type: &'static str,
    },
}

impl From<Scalar> for CategoryValue {
    fn from(value: Scalar) -> Self {
        CategoryValue::Set(value)
    }
}

impl From<&Scalar> for CategoryValue {
    fn from(value: &Scalar) -> Self {
        CategoryValue::Set(value.clone())
    }
}

impl From<bool> for CategoryValue {
    fn from(value: bool) -> Self {
        CategoryValue::Set(Scalar::Bool(value))
    }
}

impl From<i64> for CategoryValue {
    fn from(value: i64) -> Self {
        CategoryValue::Set(Scalar::Int(value))
    }
}

impl From<i32> for CategoryValue {
    fn from(value: i32) -> Self {
        CategoryValue::Set(Scalar::Int(value as i64))
    }
}

impl From<f64> for CategoryValue {
    fn from(value: f64) -> Self {
        CategoryValue::Set(Scalar::Float(value))
    }
}

impl From<&str> for CategoryValue {
    fn from(value: &str) -> Self {
        CategoryValue::Set(Scalar::Str(value.to_string()))
    }
}

impl From<String> for CategoryValue {
    fn from(value: String) -> Self {
        CategoryValue::Set(Scalar::Str(value))
    }
}

impl<T: Into<Scalar>> From<Option<T>> for CategoryValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => CategoryValue::Set(v.into()),
            None => CategoryValue::Keep,
        }
    }
}

impl From<serde_json::Value> for CategoryValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => CategoryValue::Keep,
            Value::Bool(b) => CategoryValue::Set(Scalar::Bool(b)),
            Value::String(s) => CategoryValue::Set(Scalar::Str(s)),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => CategoryValue::Set(Scalar::Int(i)),
                (None, Some(f)) => CategoryValue::Set(Scalar::Float(f)),
                (None, None) => CategoryValue::Invalid {
                    value: n.to_string(),
                    actual_type: "number",
                },
            },
            other => CategoryValue::Invalid {
                actual_type: json_type_name(&other),
                value: other.to_string(),
            },
        }
    }
}

/// Validate a batch of entries; `None` values mean "leave untouched".
pub(crate) fn validate_entries<I, K, V>(entries: I) -> Result<Vec<(String, Option<Scalar>)>, ApiError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<CategoryKey>,
    V: Into<CategoryValue>,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            let key = key.into().validate()?;
            match value.into() {
                // Text formats have no spelling for NaN or infinity
                CategoryValue::Set(Scalar::Float(f)) if !f.is_finite() => {
                    Err(ApiError::InvalidValueType {
                        key,
                        value: f.to_string(),
                        actual_type: "non-finite float",
                    })
                }
                CategoryValue::Set(scalar) => Ok((key, Some(scalar))),
                CategoryValue::Keep => Ok((key, None)),
                CategoryValue::Invalid { value, actual_type } => Err(ApiError::InvalidValueType {
                    key,
                    value,
                    actual_type,
                }),
            }
        })
        .collect()
}

/// Apply validated entries: later entries for the same key win.
pub(crate) fn apply_entries(map: &mut CategoryMap, entries: &[(String, Option<Scalar>)]) {
    for (key, value) in entries {
        if let Some(value) = value {
            map.insert(key.clone(), value.clone());
        }
    }
}

/// Category facet of one entity
#[derive(Clone)]
pub struct Categories {
    guard: Arc<AccessGuard>,
}

impl Categories {
    pub fn new(guard: Arc<AccessGuard>) -> Self {
        Self { guard }
    }

    /// Merge entries into the mapping.
    ///
    /// Every key and value is validated before anything is written.
    pub fn add<I, K, V>(&self, entries: I) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<CategoryKey>,
        V: Into<CategoryValue>,
    {
        let entries = validate_entries(entries)?;
        if entries.iter().all(|(_, v)| v.is_none()) {
            return Ok(());
        }
        self.guard.modify(|doc| {
            apply_entries(&mut doc.categories, &entries);
            Ok(())
        })
    }

    /// Single-key form of [`Categories::add`].
    pub fn set(&self, key: impl Into<CategoryKey>, value: impl Into<CategoryValue>) -> Result<(), ApiError> {
        self.add([(key.into(), value.into())])
    }

    /// Delete keys; absent ones are ignored.
    pub fn remove<I, K>(&self, keys: I) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        self.guard.modify(|doc| {
            for key in &keys {
                doc.categories.remove(key);
            }
            Ok(())
        })
    }

    /// Single-key form of [`Categories::remove`].
    pub fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.remove([key])
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        self.guard.modify(|doc| {
            doc.categories.clear();
            Ok(())
        })
    }

    /// Replace the whole mapping in one write.
    pub fn replace<I, K, V>(&self, entries: I) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<CategoryKey>,
        V: Into<CategoryValue>,
    {
        let entries = validate_entries(entries)?;
        self.guard.modify(|doc| {
            doc.categories.clear();
            apply_entries(&mut doc.categories, &entries);
            Ok(())
        })
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Result<Scalar, ApiError> {
        self.try_get(key)?
            .ok_or_else(|| ApiError::KeyNotFound(key.to_string()))
    }

    /// Value for `key`, `None` if absent.
    pub fn try_get(&self, key: &str) -> Result<Option<Scalar>, ApiError> {
        self.guard.read(|doc| doc.categories.get(key).cloned())
    }

    /// Values for `keys`, in the order given. Fails if any key is missing.
    pub fn get_list<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<Scalar>, ApiError> {
        let map = self.to_map()?;
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                map.get(key)
                    .cloned()
                    .ok_or_else(|| ApiError::KeyNotFound(key.to_string()))
            })
            .collect()
    }

    /// Mapping restricted to `keys`. Fails if any key is missing.
    pub fn get_map<I, K>(&self, keys: I) -> Result<CategoryMap, ApiError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let map = self.to_map()?;
        keys.into_iter()
            .map(|key| {
                let key = key.as_ref();
                map.get(key)
                    .map(|v| (key.to_string(), v.clone()))
                    .ok_or_else(|| ApiError::KeyNotFound(key.to_string()))
            })
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, ApiError> {
        self.guard.read(|doc| doc.categories.contains_key(key))
    }

    pub fn keys(&self) -> Result<Vec<String>, ApiError> {
        self.guard.read(|doc| doc.categories.keys().cloned().collect())
    }

    pub fn values(&self) -> Result<Vec<Scalar>, ApiError> {
        self.guard.read(|doc| doc.categories.values().cloned().collect())
    }

    pub fn to_map(&self) -> Result<CategoryMap, ApiError> {
        self.guard.read(|doc| doc.categories.clone())
    }

    pub fn len(&self) -> Result<usize, ApiError> {
        self.guard.read(|doc| doc.categories.len())
    }

    pub fn is_empty(&self) -> Result<bool, ApiError> {
        Ok(self.len()? == 0)
    }

    /// Equality against a plain mapping.
    pub fn set_eq(&self, other: &BTreeMap<String, Scalar>) -> Result<bool, ApiError> {
        Ok(&self.to_map()? == other)
    }
}

impl std::fmt::Debug for Categories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Categories")
            .field("path", &self.guard.path())
            .finish()
    }
}
