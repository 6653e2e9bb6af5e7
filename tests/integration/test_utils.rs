//! Shared fixtures for integration tests

use grove::{Collection, Entity, Scalar};
use std::path::Path;

/// Open (creating if needed) an entity directory under `root`.
pub fn entity(root: &Path, name: &str) -> Entity {
    Entity::open(root.join(name)).unwrap()
}

/// Collection of fresh entities named `names`, in order.
pub fn collection_of(root: &Path, names: &[&str]) -> (Collection, Vec<Entity>) {
    let entities: Vec<Entity> = names.iter().map(|name| entity(root, name)).collect();
    (Collection::from_entities(entities.clone()), entities)
}

pub fn s(value: &str) -> Scalar {
    Scalar::Str(value.to_string())
}

pub fn some(value: &str) -> Option<Scalar> {
    Some(s(value))
}
