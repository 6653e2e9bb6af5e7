//! Collection membership, indexing, set algebra, and parallel map

use super::test_utils::{collection_of, entity};
use grove::{ApiError, BackendRegistry, Collection, Entity, FsDiscovery, Lookup, Member};
use proptest::collection::btree_set;
use proptest::test_runner::{Config, TestRunner};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn discovering(temp_dir: &TempDir) -> Collection {
    let discovery = FsDiscovery::new(temp_dir.path(), Arc::new(BackendRegistry::standard()));
    Collection::with_discovery(Arc::new(discovery))
}

#[test]
fn test_members_are_unique_and_ordered() {
    let temp_dir = TempDir::new().unwrap();
    let (mut collection, trees) = collection_of(temp_dir.path(), &["maple", "pine", "oak"]);

    collection.add(&trees[0]).unwrap();
    collection.add(vec![trees[1].clone(), trees[2].clone()]).unwrap();
    assert_eq!(collection.len(), 3);
    assert_eq!(collection.names(), vec!["maple", "pine", "oak"]);

    // A second handle to the same entity is the same member
    collection.add(Entity::open(trees[0].path()).unwrap()).unwrap();
    assert_eq!(collection.len(), 3);
}

#[test]
fn test_patterns_resolve_through_discovery() {
    let temp_dir = TempDir::new().unwrap();
    for name in ["maple", "pine", "pinyon", "oak"] {
        entity(temp_dir.path(), name);
    }

    let mut collection = discovering(&temp_dir);
    collection.add("pin*").unwrap();
    assert_eq!(collection.names(), vec!["pine", "pinyon"]);

    collection.add(vec![Member::from("oak"), Member::from("maple")]).unwrap();
    assert_eq!(collection.len(), 4);

    // Removing by glob name
    collection.remove("pi*").unwrap();
    assert_eq!(collection.names(), vec!["oak", "maple"]);

    // Without discovery a string cannot be resolved
    let mut plain = Collection::new();
    assert!(matches!(plain.add("oak"), Err(ApiError::InvalidPattern { .. })));
}

#[test]
fn test_indexing_and_lookup() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, trees) = collection_of(temp_dir.path(), &["maple", "pine", "oak", "elm"]);

    assert_eq!(collection.get(0).unwrap(), trees[0]);
    assert_eq!(collection.get(-1).unwrap(), trees[3]);
    assert!(matches!(
        collection.get(4),
        Err(ApiError::IndexOutOfRange { index: 4, len: 4 })
    ));

    let evens = collection.slice(None, None, 2).unwrap();
    assert_eq!(evens.names(), vec!["maple", "oak"]);
    let reversed = collection.slice(None, None, -1).unwrap();
    assert_eq!(reversed.names(), vec!["elm", "oak", "pine", "maple"]);

    let picked = collection.take(&[3, 0]).unwrap();
    assert_eq!(picked.names(), vec!["elm", "maple"]);

    let masked = collection.mask(&[true, false, false, true]).unwrap();
    assert_eq!(masked.names(), vec!["maple", "elm"]);
    assert!(matches!(
        collection.mask(&[true]),
        Err(ApiError::InvalidIndex(_))
    ));

    match collection.lookup("pine").unwrap() {
        Lookup::Collection(found) => assert_eq!(found.get(0).unwrap(), trees[1]),
        Lookup::Entity(_) => panic!("name lookup should give a collection"),
    }
    match collection.lookup(&trees[2].uuid().to_string()).unwrap() {
        Lookup::Entity(found) => assert_eq!(found, trees[2]),
        Lookup::Collection(_) => panic!("uuid lookup should give an entity"),
    }
    assert!(matches!(
        collection.lookup("sequoia"),
        Err(ApiError::KeyNotFound(_))
    ));
}

#[test]
fn test_set_algebra_sizes() {
    let temp_dir = TempDir::new().unwrap();
    let names = ["a", "b", "c", "d", "e", "f"];
    let (_, trees) = collection_of(temp_dir.path(), &names);

    let mut runner = TestRunner::new(Config::with_cases(64));
    let n = names.len();
    runner
        .run(&(btree_set(0..n, 0..=n), btree_set(0..n, 0..=n)), |(xs, ys)| {
            let x: Collection = xs.iter().map(|&i| trees[i].clone()).collect();
            let y: Collection = ys.iter().map(|&i| trees[i].clone()).collect();

            let union = &x | &y;
            let both = &x & &y;
            assert_eq!(union.len(), x.len() + y.len() - both.len());
            assert!((&(&x - &y) & &y).is_empty());
            assert_eq!((&x ^ &y).len(), union.len() - both.len());
            assert_eq!(&x + &y, union);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_operators_with_entities() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, trees) = collection_of(temp_dir.path(), &["maple", "pine"]);
    let oak = entity(temp_dir.path(), "oak");

    let grown = &collection + &oak;
    assert_eq!(grown.names(), vec!["maple", "pine", "oak"]);
    let shrunk = &grown - &trees[0];
    assert_eq!(shrunk.names(), vec!["pine", "oak"]);
}

#[test]
fn test_map_in_parallel_keeps_member_order() {
    let temp_dir = TempDir::new().unwrap();
    let names: Vec<String> = (0..9).map(|i| format!("tree{}", i)).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (collection, _) = collection_of(temp_dir.path(), &name_refs);

    let calls = AtomicUsize::new(0);
    let results = collection
        .map(
            |member| {
                calls.fetch_add(1, Ordering::SeqCst);
                member.tags().add("visited").unwrap();
                Some(member.name())
            },
            4,
        )
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 9);
    let mapped: Vec<String> = results.into_iter().map(Option::unwrap).collect();
    assert_eq!(mapped, names);
    assert!(collection.tags().contains("visited").unwrap());

    // All-None results collapse to None
    assert!(collection.map(|_| None::<()>, 3).is_none());
}
