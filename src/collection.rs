//! Collection: ordered, deduplicated set of entity references.
//!
//! Insertion order is the canonical order for indexing and for every
//! aggregated result. Members are deduplicated by UUID.

use crate::aggregate::{AggCategories, AggTags};
use crate::discovery::Discovery;
use crate::entity::Entity;
use crate::error::ApiError;
use glob::Pattern;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

/// Item accepted by [`Collection::add`]
pub enum Member {
    Entity(Entity),
    Many(Vec<Member>),
    /// Name or glob pattern handed to the discovery collaborator.
    Pattern(String),
}

impl From<Entity> for Member {
    fn from(entity: Entity) -> Self {
        Member::Entity(entity)
    }
}

impl From<&Entity> for Member {
    fn from(entity: &Entity) -> Self {
        Member::Entity(entity.clone())
    }
}

impl From<Vec<Entity>> for Member {
    fn from(entities: Vec<Entity>) -> Self {
        Member::Many(entities.into_iter().map(Member::Entity).collect())
    }
}

impl From<&[Entity]> for Member {
    fn from(entities: &[Entity]) -> Self {
        Member::Many(entities.iter().cloned().map(Member::Entity).collect())
    }
}

impl<const N: usize> From<[&Entity; N]> for Member {
    fn from(entities: [&Entity; N]) -> Self {
        Member::Many(entities.into_iter().cloned().map(Member::Entity).collect())
    }
}

impl From<Vec<Member>> for Member {
    fn from(members: Vec<Member>) -> Self {
        Member::Many(members)
    }
}

impl From<&Collection> for Member {
    fn from(collection: &Collection) -> Self {
        Member::from(collection.members.clone())
    }
}

impl From<&str> for Member {
    fn from(pattern: &str) -> Self {
        Member::Pattern(pattern.to_string())
    }
}

impl From<String> for Member {
    fn from(pattern: String) -> Self {
        Member::Pattern(pattern)
    }
}

/// Selector accepted by [`Collection::remove`]
#[derive(Debug, Clone)]
pub enum Selector {
    /// Position; negative counts from the end.
    Index(isize),
    Entity(Entity),
    /// Exact member name or glob pattern over names.
    Name(String),
}

impl From<isize> for Selector {
    fn from(index: isize) -> Self {
        Selector::Index(index)
    }
}

impl From<i32> for Selector {
    fn from(index: i32) -> Self {
        Selector::Index(index as isize)
    }
}

impl From<&Entity> for Selector {
    fn from(entity: &Entity) -> Self {
        Selector::Entity(entity.clone())
    }
}

impl From<Entity> for Selector {
    fn from(entity: Entity) -> Self {
        Selector::Entity(entity)
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

/// Result of a string lookup
///
/// A name always yields a sub-collection; a UUID yields the entity itself.
#[derive(Debug, Clone)]
pub enum Lookup {
    Collection(Collection),
    Entity(Entity),
}

/// Ordered, deduplicated sequence of entities
#[derive(Clone, Default)]
pub struct Collection {
    members: Vec<Entity>,
    discovery: Option<Arc<dyn Discovery>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty collection that resolves string items through `discovery`.
    pub fn with_discovery(discovery: Arc<dyn Discovery>) -> Self {
        Self {
            members: Vec::new(),
            discovery: Some(discovery),
        }
    }

    pub fn from_entities<I: IntoIterator<Item = Entity>>(entities: I) -> Self {
        let mut collection = Self::new();
        collection.extend_unique(entities);
        collection
    }

    /// New collection sharing this one's discovery.
    pub(crate) fn derived(&self, members: Vec<Entity>) -> Self {
        let mut collection = Self {
            members: Vec::with_capacity(members.len()),
            discovery: self.discovery.clone(),
        };
        collection.extend_unique(members);
        collection
    }

    fn extend_unique<I: IntoIterator<Item = Entity>>(&mut self, entities: I) {
        let mut seen: HashSet<Uuid> = self.members.iter().map(Entity::uuid).collect();
        for entity in entities {
            if seen.insert(entity.uuid()) {
                self.members.push(entity);
            }
        }
    }

    /// Add entities, nested batches, or patterns resolved by discovery.
    ///
    /// Entities already present are skipped.
    pub fn add(&mut self, item: impl Into<Member>) -> Result<(), ApiError> {
        let mut resolved = Vec::new();
        self.resolve_member(item.into(), &mut resolved)?;
        self.extend_unique(resolved);
        Ok(())
    }

    fn resolve_member(&self, member: Member, out: &mut Vec<Entity>) -> Result<(), ApiError> {
        match member {
            Member::Entity(entity) => out.push(entity),
            Member::Many(items) => {
                for item in items {
                    self.resolve_member(item, out)?;
                }
            }
            Member::Pattern(pattern) => {
                let discovery = self.discovery.as_ref().ok_or_else(|| ApiError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: "collection has no discovery configured".to_string(),
                })?;
                out.extend(discovery.resolve(&pattern)?);
            }
        }
        Ok(())
    }

    /// Remove members matching `selector`.
    pub fn remove(&mut self, selector: impl Into<Selector>) -> Result<(), ApiError> {
        self.remove_all([selector.into()])
    }

    /// Remove every member matched by any of `selectors`.
    pub fn remove_all<I>(&mut self, selectors: I) -> Result<(), ApiError>
    where
        I: IntoIterator,
        I::Item: Into<Selector>,
    {
        let mut doomed: HashSet<Uuid> = HashSet::new();
        for selector in selectors {
            match selector.into() {
                Selector::Index(index) => {
                    doomed.insert(self.get(index)?.uuid());
                }
                Selector::Entity(entity) => {
                    doomed.insert(entity.uuid());
                }
                Selector::Name(name) => {
                    // Names that are not valid patterns still match exactly
                    let pattern = Pattern::new(&name).ok();
                    doomed.extend(
                        self.members
                            .iter()
                            .filter(|m| {
                                let member_name = m.name();
                                member_name == name
                                    || pattern.as_ref().is_some_and(|p| p.matches(&member_name))
                            })
                            .map(Entity::uuid),
                    );
                }
            }
        }
        self.members.retain(|m| !doomed.contains(&m.uuid()));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.members.iter()
    }

    pub fn members(&self) -> &[Entity] {
        &self.members
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        self.members.iter().any(|m| m == entity)
    }

    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(Entity::name).collect()
    }

    pub fn uuids(&self) -> Vec<Uuid> {
        self.members.iter().map(Entity::uuid).collect()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path().to_path_buf()).collect()
    }

    fn normalize_index(&self, index: isize) -> Result<usize, ApiError> {
        let len = self.members.len() as isize;
        let resolved = if index < 0 { index + len } else { index };
        if resolved < 0 || resolved >= len {
            return Err(ApiError::IndexOutOfRange {
                index,
                len: self.members.len(),
            });
        }
        Ok(resolved as usize)
    }

    /// Member at `index`; negative counts from the end.
    pub fn get(&self, index: isize) -> Result<Entity, ApiError> {
        let i = self.normalize_index(index)?;
        Ok(self.members[i].clone())
    }

    /// Sub-collection for `start..stop` stepping by `step`, with the usual
    /// clamping of out-of-range bounds and negative positions.
    pub fn slice(&self, start: Option<isize>, stop: Option<isize>, step: isize) -> Result<Self, ApiError> {
        if step == 0 {
            return Err(ApiError::InvalidIndex("slice step cannot be zero".to_string()));
        }
        let len = self.members.len() as isize;
        let clamp = |bound: isize, lower: isize, upper: isize| -> isize {
            let b = if bound < 0 { bound + len } else { bound };
            b.clamp(lower, upper)
        };

        // Positions stay within 0..len, so any step size is safe
        let stride = step.unsigned_abs();
        let positions: Vec<isize> = if step > 0 {
            let start = start.map_or(0, |s| clamp(s, 0, len));
            let stop = stop.map_or(len, |s| clamp(s, 0, len));
            (start..stop).step_by(stride).collect()
        } else {
            let start = start.map_or(len - 1, |s| clamp(s, -1, len - 1));
            let stop = stop.map_or(-1, |s| clamp(s, -1, len - 1));
            (stop + 1..=start).rev().step_by(stride).collect()
        };
        let picked = positions
            .into_iter()
            .map(|i| self.members[i as usize].clone())
            .collect();
        Ok(self.derived(picked))
    }

    /// Members at `indices`, in that order.
    pub fn take(&self, indices: &[isize]) -> Result<Self, ApiError> {
        let picked = indices
            .iter()
            .map(|&i| self.get(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.derived(picked))
    }

    /// Members whose mask entry is true. The mask must match the length.
    pub fn mask(&self, mask: &[bool]) -> Result<Self, ApiError> {
        if mask.len() != self.members.len() {
            return Err(ApiError::InvalidIndex(format!(
                "boolean mask of length {} does not match collection of {} members",
                mask.len(),
                self.members.len()
            )));
        }
        let picked = self
            .members
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(m, _)| m.clone())
            .collect();
        Ok(self.derived(picked))
    }

    /// Every member named `name`; possibly empty.
    pub fn by_name(&self, name: &str) -> Self {
        let picked = self
            .members
            .iter()
            .filter(|m| m.name() == name)
            .cloned()
            .collect();
        self.derived(picked)
    }

    pub fn by_uuid(&self, uuid: &Uuid) -> Result<Entity, ApiError> {
        self.members
            .iter()
            .find(|m| m.uuid() == *uuid)
            .cloned()
            .ok_or_else(|| ApiError::KeyNotFound(uuid.to_string()))
    }

    /// Look up by name first, then by UUID.
    ///
    /// A matching name returns a sub-collection; a matching UUID returns the
    /// entity itself.
    pub fn lookup(&self, key: &str) -> Result<Lookup, ApiError> {
        let named = self.by_name(key);
        if !named.is_empty() {
            return Ok(Lookup::Collection(named));
        }
        self.members
            .iter()
            .find(|m| m.uuid().to_string() == key)
            .cloned()
            .map(Lookup::Entity)
            .ok_or_else(|| {
                ApiError::KeyNotFound(format!("no name or uuid matching '{}'", key))
            })
    }

    /// Members of either, this collection's order first.
    pub fn union(&self, other: &Collection) -> Self {
        self.derived(self.members.iter().chain(other.members.iter()).cloned().collect())
    }

    pub fn intersection(&self, other: &Collection) -> Self {
        let picked = self
            .members
            .iter()
            .filter(|m| other.contains(m))
            .cloned()
            .collect();
        self.derived(picked)
    }

    pub fn difference(&self, other: &Collection) -> Self {
        let picked = self
            .members
            .iter()
            .filter(|m| !other.contains(m))
            .cloned()
            .collect();
        self.derived(picked)
    }

    pub fn symmetric_difference(&self, other: &Collection) -> Self {
        let picked = self
            .members
            .iter()
            .filter(|m| !other.contains(m))
            .chain(other.members.iter().filter(|m| !self.contains(m)))
            .cloned()
            .collect();
        self.derived(picked)
    }

    /// Same members in the same order.
    pub fn same_members(&self, other: &Collection) -> bool {
        self.uuids() == other.uuids()
    }

    /// Apply `f` to every member, in member order.
    ///
    /// With `workers > 1` members are split into contiguous chunks, each
    /// handled by its own scoped thread. Returns `None` when every result is
    /// `None`.
    pub fn map<R, F>(&self, f: F, workers: usize) -> Option<Vec<Option<R>>>
    where
        F: Fn(&Entity) -> Option<R> + Sync,
        R: Send,
    {
        let results: Vec<Option<R>> = if workers <= 1 || self.members.len() <= 1 {
            self.members.iter().map(&f).collect()
        } else {
            let chunk_size = self.members.len().div_ceil(workers);
            let f = &f;
            thread::scope(|scope| {
                let handles: Vec<_> = self
                    .members
                    .chunks(chunk_size)
                    .map(|chunk| scope.spawn(move || chunk.iter().map(f).collect::<Vec<_>>()))
                    .collect();
                handles
                    .into_iter()
                    .flat_map(|handle| match handle.join() {
                        Ok(part) => part,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect()
            })
        };

        if results.iter().all(Option::is_none) {
            None
        } else {
            Some(results)
        }
    }

    /// Tags aggregated over every member.
    pub fn tags(&self) -> AggTags<'_> {
        AggTags::new(self)
    }

    /// Categories aggregated over every member.
    pub fn categories(&self) -> AggCategories<'_> {
        AggCategories::new(self)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("members", &self.names())
            .finish()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.same_members(other)
    }
}

impl Eq for Collection {}

impl FromIterator<Entity> for Collection {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self::from_entities(iter)
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl From<&Entity> for Collection {
    fn from(entity: &Entity) -> Self {
        Self::from_entities([entity.clone()])
    }
}

macro_rules! collection_op {
    ($trait:ident, $method:ident, $impl_fn:ident) => {
        impl std::ops::$trait<&Collection> for &Collection {
            type Output = Collection;

            fn $method(self, rhs: &Collection) -> Collection {
                self.$impl_fn(rhs)
            }
        }

        impl std::ops::$trait<&Entity> for &Collection {
            type Output = Collection;

            fn $method(self, rhs: &Entity) -> Collection {
                self.$impl_fn(&Collection::from(rhs))
            }
        }
    };
}

collection_op!(Add, add, union);
collection_op!(BitOr, bitor, union);
collection_op!(BitAnd, bitand, intersection);
collection_op!(Sub, sub, difference);
collection_op!(BitXor, bitxor, symmetric_difference);
