//! Aggregated views of tags and categories across a collection.
//!
//! Nothing here is persisted. Every call reads the current state of each
//! member (one read token per member, no cross-member atomicity) and returns
//! results aligned to collection order.

use crate::categories::{apply_entries, validate_entries, CategoryKey, CategoryValue};
use crate::collection::Collection;
use crate::document::Scalar;
use crate::entity::Entity;
use crate::error::{json_type_name, ApiError};
use crate::tags::{fuzzy_match, FuzzyQuery, Scope, TagArg, TagOperand, TagQuery};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Tags across every member of a collection
///
/// Used as a set (length, membership, set operations) this view means its
/// `all` set: the tags every member carries.
#[derive(Clone, Copy)]
pub struct AggTags<'a> {
    collection: &'a Collection,
}

impl<'a> AggTags<'a> {
    pub fn new(collection: &'a Collection) -> Self {
        Self { collection }
    }

    fn member_sets(&self) -> Result<Vec<BTreeSet<String>>, ApiError> {
        self.collection.iter().map(|m| m.tags().set()).collect()
    }

    /// Tags carried by at least one member.
    pub fn any(&self) -> Result<BTreeSet<String>, ApiError> {
        let mut union = BTreeSet::new();
        for set in self.member_sets()? {
            union.extend(set);
        }
        Ok(union)
    }

    /// Tags carried by every member; empty for an empty collection.
    pub fn all(&self) -> Result<BTreeSet<String>, ApiError> {
        let mut sets = self.member_sets()?.into_iter();
        let first = match sets.next() {
            Some(first) => first,
            None => return Ok(BTreeSet::new()),
        };
        Ok(sets.fold(first, |acc, set| acc.intersection(&set).cloned().collect()))
    }

    pub fn len(&self) -> Result<usize, ApiError> {
        Ok(self.all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ApiError> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, tag: &str) -> Result<bool, ApiError> {
        Ok(self.all()?.contains(tag))
    }

    /// Evaluate `query` against each member's own tags.
    pub fn query(&self, query: impl Into<TagQuery>) -> Result<Vec<bool>, ApiError> {
        let query = query.into();
        self.member_sets()
            .map(|sets| sets.iter().map(|set| query.evaluate(set)).collect())
    }

    /// Members for which `query` holds.
    pub fn filter(&self, query: impl Into<TagQuery>) -> Result<Collection, ApiError> {
        let mask = self.query(query)?;
        self.collection.mask(&mask)
    }

    /// Fuzzy matches from the `all` pool (scope `All`) or the `any` pool
    /// (scope `Any`). Matches of several queries are unioned.
    pub fn fuzzy(
        &self,
        query: impl Into<FuzzyQuery>,
        threshold: u8,
        scope: Scope,
    ) -> Result<Vec<String>, ApiError> {
        let pool = match scope {
            Scope::All => self.all()?,
            Scope::Any => self.any()?,
        };
        Ok(fuzzy_match(&pool, &query.into(), threshold, Scope::Any))
    }

    /// Add tags to every member.
    pub fn add(&self, tags: impl Into<TagArg>) -> Result<(), ApiError> {
        let batch = tags.into().flatten()?;
        for member in self.collection {
            member.tags().add(batch.clone())?;
        }
        Ok(())
    }

    /// Remove tags from every member.
    pub fn remove(&self, tags: impl Into<TagArg>) -> Result<(), ApiError> {
        let batch = tags.into().flatten()?;
        for member in self.collection {
            member.tags().remove(batch.clone())?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        for member in self.collection {
            member.tags().clear()?;
        }
        Ok(())
    }

    /// Give every member exactly `tags`.
    pub fn replace(&self, tags: impl Into<TagArg>) -> Result<(), ApiError> {
        let batch = tags.into().flatten()?;
        for member in self.collection {
            member.tags().replace(batch.clone())?;
        }
        Ok(())
    }

    pub fn union<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()?.union(&other).cloned().collect())
    }

    pub fn intersect<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()?.intersection(&other).cloned().collect())
    }

    pub fn difference<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()?.difference(&other).cloned().collect())
    }

    pub fn difference_from<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(other.difference(&self.all()?).cloned().collect())
    }

    pub fn symmetric_difference<'o>(
        &self,
        other: impl Into<TagOperand<'o>>,
    ) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()?.symmetric_difference(&other).cloned().collect())
    }

    pub fn set_eq<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()? == other)
    }

    pub fn is_subset_of<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()?.is_subset(&other))
    }

    pub fn is_proper_subset_of<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        let mine = self.all()?;
        Ok(mine.is_subset(&other) && mine != other)
    }

    pub fn is_superset_of<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.all()?.is_superset(&other))
    }

    pub fn is_proper_superset_of<'o>(&self, other: impl Into<TagOperand<'o>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        let mine = self.all()?;
        Ok(mine.is_superset(&other) && mine != other)
    }
}

/// Per-member values for one key; `None` where a member lacks it.
pub type MemberValues = Vec<Option<Scalar>>;

/// Categories across every member of a collection
#[derive(Clone, Copy)]
pub struct AggCategories<'a> {
    collection: &'a Collection,
}

impl<'a> AggCategories<'a> {
    pub fn new(collection: &'a Collection) -> Self {
        Self { collection }
    }

    fn member_maps(&self) -> Result<Vec<BTreeMap<String, Scalar>>, ApiError> {
        self.collection.iter().map(|m| m.categories().to_map()).collect()
    }

    /// Every key present in some member, with each member's value.
    pub fn any(&self) -> Result<BTreeMap<String, MemberValues>, ApiError> {
        let maps = self.member_maps()?;
        let keys: BTreeSet<&String> = maps.iter().flat_map(|m| m.keys()).collect();
        Ok(keys
            .into_iter()
            .map(|key| {
                let values = maps.iter().map(|m| m.get(key).cloned()).collect();
                (key.clone(), values)
            })
            .collect())
    }

    /// Keys present in every member, with each member's value.
    pub fn all(&self) -> Result<BTreeMap<String, Vec<Scalar>>, ApiError> {
        let maps = self.member_maps()?;
        let first = match maps.first() {
            Some(first) => first,
            None => return Ok(BTreeMap::new()),
        };
        Ok(first
            .keys()
            .filter(|key| maps.iter().all(|m| m.contains_key(*key)))
            .map(|key| {
                let values = maps.iter().filter_map(|m| m.get(key).cloned()).collect();
                (key.clone(), values)
            })
            .collect())
    }

    /// Number of keys shared by every member.
    pub fn len(&self) -> Result<usize, ApiError> {
        Ok(self.all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ApiError> {
        Ok(self.len()? == 0)
    }

    /// Whether every member has `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.all()?.contains_key(key))
    }

    pub fn keys(&self, scope: Scope) -> Result<Vec<String>, ApiError> {
        Ok(match scope {
            Scope::All => self.all()?.into_keys().collect(),
            Scope::Any => self.any()?.into_keys().collect(),
        })
    }

    /// Per-member value lists, aligned with [`AggCategories::keys`].
    pub fn values(&self, scope: Scope) -> Result<Vec<MemberValues>, ApiError> {
        Ok(match scope {
            Scope::All => self
                .all()?
                .into_values()
                .map(|values| values.into_iter().map(Some).collect())
                .collect(),
            Scope::Any => self.any()?.into_values().collect(),
        })
    }

    /// Each member's value for `key`.
    pub fn get(&self, key: &str) -> Result<MemberValues, ApiError> {
        self.member_maps()
            .map(|maps| maps.iter().map(|m| m.get(key).cloned()).collect())
    }

    /// Per-member values for each of `keys`, in the order given.
    pub fn get_list<K: AsRef<str>>(&self, keys: &[K]) -> Result<Vec<MemberValues>, ApiError> {
        let maps = self.member_maps()?;
        Ok(keys
            .iter()
            .map(|key| maps.iter().map(|m| m.get(key.as_ref()).cloned()).collect())
            .collect())
    }

    /// Per-member values keyed by each of `keys`.
    pub fn get_map<I, K>(&self, keys: I) -> Result<BTreeMap<String, MemberValues>, ApiError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let maps = self.member_maps()?;
        Ok(keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                (key.to_string(), maps.iter().map(|m| m.get(key).cloned()).collect())
            })
            .collect())
    }

    /// Merge entries into every member. Validated once, before any write.
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
        for member in self.collection {
            member.guard().modify(|doc| {
                apply_entries(&mut doc.categories, &entries);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Set one key to the same value on every member.
    pub fn set(&self, key: impl Into<CategoryKey>, value: impl Into<CategoryValue>) -> Result<(), ApiError> {
        self.add([(key.into(), value.into())])
    }

    /// Set one key to a different value on each member, in collection order.
    pub fn set_each<V: Into<CategoryValue>>(
        &self,
        key: impl Into<CategoryKey>,
        values: Vec<V>,
    ) -> Result<(), ApiError> {
        if values.len() != self.collection.len() {
            return Err(ApiError::TypeMismatch(format!(
                "got {} values for a collection of {} members",
                values.len(),
                self.collection.len()
            )));
        }
        let key: CategoryKey = key.into();
        let entries = validate_entries(values.into_iter().map(|v| (key.clone(), v)))?;
        for (member, entry) in self.collection.iter().zip(entries) {
            member.guard().modify(|doc| {
                apply_entries(&mut doc.categories, std::slice::from_ref(&entry));
                Ok(())
            })?;
        }
        Ok(())
    }

    pub fn remove<I, K>(&self, keys: I) -> Result<(), ApiError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
        for member in self.collection {
            member.categories().remove(&keys)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        for member in self.collection {
            member.categories().clear()?;
        }
        Ok(())
    }

    /// Partition members by their values for `keys`.
    ///
    /// A member lacking any of the keys belongs to no group.
    pub fn groupby(&self, keys: impl Into<GroupKeys>) -> Result<Groups, ApiError> {
        let keys = keys.into().resolve()?;
        let maps = self.member_maps()?;

        let mut order: Vec<Vec<Scalar>> = Vec::new();
        let mut members: BTreeMap<usize, Vec<Entity>> = BTreeMap::new();
        for (entity, map) in self.collection.iter().zip(&maps) {
            let values: Option<Vec<Scalar>> = keys.iter().map(|k| map.get(k).cloned()).collect();
            let Some(values) = values else { continue };
            let slot = match order.iter().position(|v| *v == values) {
                Some(slot) => slot,
                None => {
                    order.push(values);
                    order.len() - 1
                }
            };
            members.entry(slot).or_default().push(entity.clone());
        }

        let groups = order
            .into_iter()
            .enumerate()
            .map(|(slot, values)| {
                let entities = members.remove(&slot).unwrap_or_default();
                (values, self.collection.derived(entities))
            })
            .collect();

        Ok(Groups { keys, groups })
    }
}

/// Keys to group by
///
/// Grouping needs an ordered key list, so unordered sets are rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKeys {
    One(String),
    Many(Vec<String>),
    Unordered(Vec<String>),
    Invalid(String),
}

impl GroupKeys {
    fn resolve(self) -> Result<Vec<String>, ApiError> {
        match self {
            GroupKeys::One(key) => Ok(vec![key]),
            GroupKeys::Many(keys) => Ok(keys),
            GroupKeys::Unordered(_) => Err(ApiError::TypeMismatch(
                "groupby keys must be a single key or an ordered list of keys, not a set"
                    .to_string(),
            )),
            GroupKeys::Invalid(kind) => Err(ApiError::TypeMismatch(format!(
                "groupby keys must be strings, got a {}",
                kind
            ))),
        }
    }
}

impl From<&str> for GroupKeys {
    fn from(key: &str) -> Self {
        GroupKeys::One(key.to_string())
    }
}

impl From<String> for GroupKeys {
    fn from(key: String) -> Self {
        GroupKeys::One(key)
    }
}

impl From<Vec<&str>> for GroupKeys {
    fn from(keys: Vec<&str>) -> Self {
        GroupKeys::Many(keys.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for GroupKeys {
    fn from(keys: Vec<String>) -> Self {
        GroupKeys::Many(keys)
    }
}

impl<const N: usize> From<[&str; N]> for GroupKeys {
    fn from(keys: [&str; N]) -> Self {
        GroupKeys::Many(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl From<BTreeSet<String>> for GroupKeys {
    fn from(keys: BTreeSet<String>) -> Self {
        GroupKeys::Unordered(keys.into_iter().collect())
    }
}

impl From<HashSet<String>> for GroupKeys {
    fn from(keys: HashSet<String>) -> Self {
        GroupKeys::Unordered(keys.into_iter().collect())
    }
}

impl From<serde_json::Value> for GroupKeys {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(key) => GroupKeys::One(key),
            serde_json::Value::Array(items) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(key) => keys.push(key),
                        other => return GroupKeys::Invalid(json_type_name(&other).to_string()),
                    }
                }
                GroupKeys::Many(keys)
            }
            other => GroupKeys::Invalid(json_type_name(&other).to_string()),
        }
    }
}

/// Lookup key for [`Groups::get`]: one value per grouping key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey(pub Vec<Scalar>);

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        GroupKey(vec![Scalar::from(value)])
    }
}

impl From<Scalar> for GroupKey {
    fn from(value: Scalar) -> Self {
        GroupKey(vec![value])
    }
}

impl From<i64> for GroupKey {
    fn from(value: i64) -> Self {
        GroupKey(vec![Scalar::Int(value)])
    }
}

impl From<bool> for GroupKey {
    fn from(value: bool) -> Self {
        GroupKey(vec![Scalar::Bool(value)])
    }
}

impl From<Vec<Scalar>> for GroupKey {
    fn from(values: Vec<Scalar>) -> Self {
        GroupKey(values)
    }
}

impl<const N: usize> From<[&str; N]> for GroupKey {
    fn from(values: [&str; N]) -> Self {
        GroupKey(values.iter().map(|v| Scalar::from(*v)).collect())
    }
}

/// Result of [`AggCategories::groupby`], in first-seen order
#[derive(Debug, Clone)]
pub struct Groups {
    keys: Vec<String>,
    groups: Vec<(Vec<Scalar>, Collection)>,
}

impl Groups {
    /// Keys the members were grouped by.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn get(&self, key: impl Into<GroupKey>) -> Option<&Collection> {
        let key = key.into();
        self.groups
            .iter()
            .find(|(values, _)| *values == key.0)
            .map(|(_, collection)| collection)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[Scalar], &Collection)> {
        self.groups.iter().map(|(values, c)| (values.as_slice(), c))
    }

    pub fn values(&self) -> impl Iterator<Item = &Collection> {
        self.groups.iter().map(|(_, c)| c)
    }
}
