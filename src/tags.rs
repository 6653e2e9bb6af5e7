//! Tags: per-entity set of unique string labels.
//!
//! Every mutation runs one read-modify-write cycle under a write token; every
//! query reads one snapshot under a read token. Tags are listed sorted.

use crate::aggregate::AggTags;
use crate::error::{json_type_name, ApiError};
use crate::fuzzy;
use crate::guard::AccessGuard;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// Fuzzy threshold used when none is configured.
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 80;

/// Whether multi-query matching (and aggregation) intersects or unions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    Any,
}

impl std::str::FromStr for Scope {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "any" => Ok(Scope::Any),
            other => Err(ApiError::TypeMismatch(format!(
                "scope must be 'all' or 'any', got '{}'",
                other
            ))),
        }
    }
}

/// Input to `add`/`remove`: a tag or an arbitrarily nested batch of tags.
///
/// Dynamically typed input (`serde_json::Value`) may carry non-string items;
/// those surface as `InvalidTagType` when the batch is flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum TagArg {
    One(String),
    Many(Vec<TagArg>),
    Invalid {
        value: String,
        actual_type: &'static str,
    },
}

impl TagArg {
    /// Flatten into a batch with duplicates removed, first occurrence kept.
    pub fn flatten(self) -> Result<Vec<String>, ApiError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.flatten_into(&mut out, &mut seen)?;
        Ok(out)
    }

    fn flatten_into(self, out: &mut Vec<String>, seen: &mut HashSet<String>) -> Result<(), ApiError> {
        match self {
            TagArg::One(tag) => {
                if seen.insert(tag.clone()) {
                    out.push(tag);
                }
            }
            TagArg::Many(items) => {
                for item in items {
                    item.flatten_into(out, seen)?;
                }
            }
            TagArg::Invalid { value, actual_type } => {
                return Err(ApiError::InvalidTagType { value, actual_type });
            }
        }
        Ok(())
    }
}

impl From<&str> for TagArg {
    fn from(tag: &str) -> Self {
        TagArg::One(tag.to_string())
    }
}

impl From<String> for TagArg {
    fn from(tag: String) -> Self {
        TagArg::One(tag)
    }
}

impl From<&String> for TagArg {
    fn from(tag: &String) -> Self {
        TagArg::One(tag.clone())
    }
}

impl<T: Into<TagArg>> From<Vec<T>> for TagArg {
    fn from(items: Vec<T>) -> Self {
        TagArg::Many(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TagArg>, const N: usize> From<[T; N]> for TagArg {
    fn from(items: [T; N]) -> Self {
        TagArg::Many(items.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for TagArg {
    fn from(items: &[&str]) -> Self {
        TagArg::Many(items.iter().map(|t| TagArg::from(*t)).collect())
    }
}

impl From<BTreeSet<String>> for TagArg {
    fn from(items: BTreeSet<String>) -> Self {
        TagArg::Many(items.into_iter().map(TagArg::One).collect())
    }
}

impl From<HashSet<String>> for TagArg {
    fn from(items: HashSet<String>) -> Self {
        TagArg::Many(items.into_iter().map(TagArg::One).collect())
    }
}

impl From<serde_json::Value> for TagArg {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(tag) => TagArg::One(tag),
            serde_json::Value::Array(items) => {
                TagArg::Many(items.into_iter().map(TagArg::from).collect())
            }
            other => TagArg::Invalid {
                actual_type: json_type_name(&other),
                value: other.to_string(),
            },
        }
    }
}

/// Boolean tag query
///
/// | variant  | meaning                                          |
/// |----------|--------------------------------------------------|
/// | `Tag`    | the tag is present                               |
/// | `All`    | every sub-query holds                            |
/// | `Any`    | at least one sub-query holds                     |
/// | `NotAll` | at least one sub-query fails                     |
///
/// `NotAll` is "missing at least one of", not "has none of": an entity
/// tagged `tree` but not `deciduous` satisfies `NotAll([tree, deciduous])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagQuery {
    Tag(String),
    All(Vec<TagQuery>),
    Any(Vec<TagQuery>),
    NotAll(Vec<TagQuery>),
}

impl TagQuery {
    pub fn tag(tag: impl Into<String>) -> Self {
        TagQuery::Tag(tag.into())
    }

    pub fn all<I, Q>(items: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<TagQuery>,
    {
        TagQuery::All(items.into_iter().map(Into::into).collect())
    }

    pub fn any<I, Q>(items: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<TagQuery>,
    {
        TagQuery::Any(items.into_iter().map(Into::into).collect())
    }

    pub fn not_all<I, Q>(items: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<TagQuery>,
    {
        TagQuery::NotAll(items.into_iter().map(Into::into).collect())
    }

    /// Evaluate against one tag set.
    pub fn evaluate<S: TagLookup + ?Sized>(&self, tags: &S) -> bool {
        match self {
            TagQuery::Tag(tag) => tags.has_tag(tag),
            TagQuery::All(items) => items.iter().all(|q| q.evaluate(tags)),
            TagQuery::Any(items) => items.iter().any(|q| q.evaluate(tags)),
            TagQuery::NotAll(items) => !items.iter().all(|q| q.evaluate(tags)),
        }
    }
}

impl From<&str> for TagQuery {
    fn from(tag: &str) -> Self {
        TagQuery::Tag(tag.to_string())
    }
}

impl From<String> for TagQuery {
    fn from(tag: String) -> Self {
        TagQuery::Tag(tag)
    }
}

impl From<&String> for TagQuery {
    fn from(tag: &String) -> Self {
        TagQuery::Tag(tag.clone())
    }
}

impl From<&TagQuery> for TagQuery {
    fn from(query: &TagQuery) -> Self {
        query.clone()
    }
}

/// Membership test a query can run against
pub trait TagLookup {
    fn has_tag(&self, tag: &str) -> bool;
}

impl TagLookup for BTreeSet<String> {
    fn has_tag(&self, tag: &str) -> bool {
        self.contains(tag)
    }
}

impl TagLookup for HashSet<String> {
    fn has_tag(&self, tag: &str) -> bool {
        self.contains(tag)
    }
}

impl TagLookup for [String] {
    fn has_tag(&self, tag: &str) -> bool {
        self.iter().any(|t| t == tag)
    }
}

impl TagLookup for Vec<String> {
    fn has_tag(&self, tag: &str) -> bool {
        self.as_slice().has_tag(tag)
    }
}

/// Right-hand side of a set operation
///
/// A bare tag string is accepted by the conversion but rejected when
/// resolved; wrap it in a list or set to compare against one tag.
pub enum TagOperand<'a> {
    Tags(&'a Tags),
    Aggregated(&'a AggTags<'a>),
    Set(BTreeSet<String>),
    List(Vec<String>),
    Tag(String),
}

impl TagOperand<'_> {
    /// Resolve to a plain set of tags.
    pub fn resolve(self) -> Result<BTreeSet<String>, ApiError> {
        match self {
            TagOperand::Tags(tags) => tags.set(),
            TagOperand::Aggregated(agg) => agg.all(),
            TagOperand::Set(set) => Ok(set),
            TagOperand::List(list) => Ok(list.into_iter().collect()),
            TagOperand::Tag(tag) => Err(ApiError::TypeMismatch(format!(
                "set operands must be tags, aggregated tags, a set or a list; got the string '{}'",
                tag
            ))),
        }
    }
}

impl<'a> From<&'a Tags> for TagOperand<'a> {
    fn from(tags: &'a Tags) -> Self {
        TagOperand::Tags(tags)
    }
}

impl<'a> From<&'a AggTags<'a>> for TagOperand<'a> {
    fn from(agg: &'a AggTags<'a>) -> Self {
        TagOperand::Aggregated(agg)
    }
}

impl From<BTreeSet<String>> for TagOperand<'_> {
    fn from(set: BTreeSet<String>) -> Self {
        TagOperand::Set(set)
    }
}

impl From<HashSet<String>> for TagOperand<'_> {
    fn from(set: HashSet<String>) -> Self {
        TagOperand::Set(set.into_iter().collect())
    }
}

impl From<Vec<String>> for TagOperand<'_> {
    fn from(list: Vec<String>) -> Self {
        TagOperand::List(list)
    }
}

impl From<Vec<&str>> for TagOperand<'_> {
    fn from(list: Vec<&str>) -> Self {
        TagOperand::List(list.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagOperand<'_> {
    fn from(list: [&str; N]) -> Self {
        TagOperand::List(list.iter().map(|t| t.to_string()).collect())
    }
}

impl From<&str> for TagOperand<'_> {
    fn from(tag: &str) -> Self {
        TagOperand::Tag(tag.to_string())
    }
}

impl From<String> for TagOperand<'_> {
    fn from(tag: String) -> Self {
        TagOperand::Tag(tag)
    }
}

/// One or more fuzzy queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyQuery(pub Vec<String>);

impl From<&str> for FuzzyQuery {
    fn from(query: &str) -> Self {
        FuzzyQuery(vec![query.to_string()])
    }
}

impl From<String> for FuzzyQuery {
    fn from(query: String) -> Self {
        FuzzyQuery(vec![query])
    }
}

impl From<Vec<&str>> for FuzzyQuery {
    fn from(queries: Vec<&str>) -> Self {
        FuzzyQuery(queries.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for FuzzyQuery {
    fn from(queries: Vec<String>) -> Self {
        FuzzyQuery(queries)
    }
}

impl<const N: usize> From<[&str; N]> for FuzzyQuery {
    fn from(queries: [&str; N]) -> Self {
        FuzzyQuery(queries.iter().map(|q| q.to_string()).collect())
    }
}

/// Match `queries` against `pool`, combining per-query hits by `scope`.
///
/// Results are ordered best score first, then alphabetically.
pub(crate) fn fuzzy_match(
    pool: &BTreeSet<String>,
    queries: &FuzzyQuery,
    threshold: u8,
    scope: Scope,
) -> Vec<String> {
    let mut combined: Option<BTreeMap<String, u8>> = None;

    for query in &queries.0 {
        let hits: BTreeMap<String, u8> =
            fuzzy::extract(query, pool.iter().map(String::as_str), threshold)
                .into_iter()
                .map(|(tag, score)| (tag.to_string(), score))
                .collect();

        combined = Some(match combined {
            None => hits,
            Some(mut acc) => match scope {
                Scope::All => {
                    acc.retain(|tag, _| hits.contains_key(tag));
                    for (tag, score) in acc.iter_mut() {
                        *score = (*score).max(hits[tag]);
                    }
                    acc
                }
                Scope::Any => {
                    for (tag, score) in hits {
                        let entry = acc.entry(tag).or_insert(score);
                        *entry = (*entry).max(score);
                    }
                    acc
                }
            },
        });
    }

    rank(combined.unwrap_or_default())
}

pub(crate) fn rank(scores: BTreeMap<String, u8>) -> Vec<String> {
    let mut ranked: Vec<(String, u8)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().map(|(tag, _)| tag).collect()
}

/// Tag facet of one entity
#[derive(Clone)]
pub struct Tags {
    guard: Arc<AccessGuard>,
}

impl Tags {
    pub fn new(guard: Arc<AccessGuard>) -> Self {
        Self { guard }
    }

    /// All tags, sorted.
    pub fn list(&self) -> Result<Vec<String>, ApiError> {
        let mut tags = self.guard.read(|doc| doc.tags.clone())?;
        tags.sort();
        Ok(tags)
    }

    /// All tags as a set.
    pub fn set(&self) -> Result<BTreeSet<String>, ApiError> {
        self.guard.read(|doc| doc.tags.iter().cloned().collect())
    }

    pub fn contains(&self, tag: &str) -> Result<bool, ApiError> {
        self.guard.read(|doc| doc.tags.iter().any(|t| t == tag))
    }

    pub fn len(&self) -> Result<usize, ApiError> {
        self.guard.read(|doc| doc.tags.len())
    }

    pub fn is_empty(&self) -> Result<bool, ApiError> {
        Ok(self.len()? == 0)
    }

    /// Add a tag or a nested batch of tags.
    ///
    /// The batch is validated before anything is written. Tags already
    /// present are skipped; if nothing is new the state file is untouched.
    pub fn add(&self, tags: impl Into<TagArg>) -> Result<(), ApiError> {
        let batch = tags.into().flatten()?;
        if batch.is_empty() {
            return Ok(());
        }
        self.guard.modify(|doc| {
            for tag in batch {
                if !doc.tags.contains(&tag) {
                    doc.tags.push(tag);
                }
            }
            Ok(())
        })
    }

    /// Remove tags; absent ones are ignored.
    pub fn remove(&self, tags: impl Into<TagArg>) -> Result<(), ApiError> {
        let batch = tags.into().flatten()?;
        if batch.is_empty() {
            return Ok(());
        }
        self.guard.modify(|doc| {
            doc.tags.retain(|t| !batch.contains(t));
            Ok(())
        })
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        self.guard.modify(|doc| {
            doc.tags.clear();
            Ok(())
        })
    }

    /// Replace every tag with `tags` in one write.
    pub fn replace(&self, tags: impl Into<TagArg>) -> Result<(), ApiError> {
        let batch = tags.into().flatten()?;
        self.guard.modify(|doc| {
            doc.tags = batch;
            Ok(())
        })
    }

    /// Evaluate a boolean query against this entity's tags.
    pub fn query(&self, query: impl Into<TagQuery>) -> Result<bool, ApiError> {
        let query = query.into();
        self.guard.read(|doc| query.evaluate(&doc.tags))
    }

    /// Existing tags scoring above `threshold` against `query`.
    pub fn fuzzy(
        &self,
        query: impl Into<FuzzyQuery>,
        threshold: u8,
        scope: Scope,
    ) -> Result<Vec<String>, ApiError> {
        let pool = self.set()?;
        Ok(fuzzy_match(&pool, &query.into(), threshold, scope))
    }

    pub fn union<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()?.union(&other).cloned().collect())
    }

    pub fn intersect<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()?.intersection(&other).cloned().collect())
    }

    /// Tags here but not in `other`.
    pub fn difference<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()?.difference(&other).cloned().collect())
    }

    /// Tags in `other` but not here.
    pub fn difference_from<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(other.difference(&self.set()?).cloned().collect())
    }

    pub fn symmetric_difference<'a>(
        &self,
        other: impl Into<TagOperand<'a>>,
    ) -> Result<BTreeSet<String>, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()?.symmetric_difference(&other).cloned().collect())
    }

    pub fn set_eq<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()? == other)
    }

    pub fn is_subset_of<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()?.is_subset(&other))
    }

    pub fn is_proper_subset_of<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        let mine = self.set()?;
        Ok(mine.is_subset(&other) && mine != other)
    }

    pub fn is_superset_of<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        Ok(self.set()?.is_superset(&other))
    }

    pub fn is_proper_superset_of<'a>(&self, other: impl Into<TagOperand<'a>>) -> Result<bool, ApiError> {
        let other = other.into().resolve()?;
        let mine = self.set()?;
        Ok(mine.is_superset(&other) && mine != other)
    }
}

impl std::fmt::Debug for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tags").field("path", &self.guard.path()).finish()
    }
}
