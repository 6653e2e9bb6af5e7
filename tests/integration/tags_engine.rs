//! Tag storage and query behaviour on single entities

use super::test_utils::entity;
use grove::{ApiError, Entity, Scope, TagArg, TagQuery, Tagged};
use std::collections::BTreeSet;
use tempfile::TempDir;

#[test]
fn test_add_contains_remove() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");

    for tag in ["tree", "acorns", "new england"] {
        assert!(!oak.tags().contains(tag).unwrap());
        oak.tags().add(tag).unwrap();
        assert!(oak.tags().contains(tag).unwrap());
    }
    assert_eq!(oak.tags().len().unwrap(), 3);

    oak.tags().remove("acorns").unwrap();
    assert!(!oak.tags().contains("acorns").unwrap());

    // Absent tags are ignored
    oak.tags().remove("pinecones").unwrap();
    assert_eq!(oak.tags().len().unwrap(), 2);
}

#[test]
fn test_tags_persist_across_handles() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    oak.tags().add(vec!["tree", "leafy", "tree"]).unwrap();

    let reopened = Entity::open(oak.path()).unwrap();
    assert_eq!(reopened, oak);
    assert_eq!(reopened.tags().list().unwrap(), vec!["leafy", "tree"]);
}

#[test]
fn test_nested_tag_arguments_flatten() {
    let arg: TagArg = vec![
        TagArg::from("tree"),
        TagArg::from(vec!["leafy", "green"]),
        TagArg::from(BTreeSet::from(["tree".to_string()])),
    ]
    .into();
    assert_eq!(arg.flatten().unwrap(), vec!["tree", "leafy", "green"]);
}

#[test]
fn test_invalid_tag_is_rejected_without_partial_write() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    oak.tags().add("tree").unwrap();

    let err = oak
        .tags()
        .add(serde_json::json!(["leafy", 42]))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTagType { actual_type: "int", .. }));
    assert_eq!(oak.tags().list().unwrap(), vec!["tree"]);
}

#[test]
fn test_query_algebra() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    oak.tags().add(["A", "B"]).unwrap();

    assert!(oak.tags().query(TagQuery::all(["A", "B"])).unwrap());
    assert!(oak.tags().query(TagQuery::any(["A", "C"])).unwrap());
    assert!(oak.tags().query(TagQuery::not_all(["C"])).unwrap());
    assert!(!oak.tags().query(TagQuery::not_all(["A", "B"])).unwrap());

    // Missing only one of the given tags is enough for NOT-ALL
    assert!(oak.tags().query(TagQuery::not_all(["A", "C"])).unwrap());
}

#[test]
fn test_nested_queries() {
    let temp_dir = TempDir::new().unwrap();
    let maple = entity(temp_dir.path(), "maple");
    maple.tags().add(["tree", "new jersey", "deciduous"]).unwrap();

    // evergreen or in NY, and not deciduous
    let query = TagQuery::all([
        TagQuery::any(["evergreen", "new york"]),
        TagQuery::not_all(["deciduous"]),
    ]);
    assert!(!maple.tags().query(&query).unwrap());

    // a tree in NJ, or anything not evergreen
    let query = TagQuery::any([
        TagQuery::all(["tree", "new jersey"]),
        TagQuery::not_all(["evergreen"]),
    ]);
    assert!(maple.tags().query(&query).unwrap());
}

#[test]
fn test_set_algebra_between_entities() {
    let temp_dir = TempDir::new().unwrap();
    let maple = entity(temp_dir.path(), "maple");
    let pine = entity(temp_dir.path(), "pine");
    maple.tags().add(["tree", "new jersey", "deciduous"]).unwrap();
    pine.tags().add(["tree", "new york", "evergreen"]).unwrap();

    let shared = maple.tags().intersect(pine.tags()).unwrap();
    assert_eq!(shared, BTreeSet::from(["tree".to_string()]));

    let either = maple.tags().union(pine.tags()).unwrap();
    assert_eq!(either.len(), 5);

    let only_maple = maple.tags().difference(pine.tags()).unwrap();
    assert_eq!(
        only_maple,
        BTreeSet::from(["deciduous".to_string(), "new jersey".to_string()])
    );

    let odd = maple.tags().symmetric_difference(pine.tags()).unwrap();
    assert_eq!(odd.len(), 4);

    assert!(maple.tags().is_subset_of(either.clone()).unwrap());
    assert!(maple.tags().is_proper_subset_of(either.clone()).unwrap());
    assert!(!maple.tags().is_superset_of(pine.tags()).unwrap());

    // A bare tag is not a set operand
    assert!(matches!(
        maple.tags().union("tree"),
        Err(ApiError::TypeMismatch(_))
    ));
}

#[test]
fn test_fuzzy_single_entity() {
    let temp_dir = TempDir::new().unwrap();
    let pine = entity(temp_dir.path(), "pine");
    pine.tags().add(["tree", "new york", "new jersey", "evergreen"]).unwrap();

    let matches = pine.tags().fuzzy("new", 80, Scope::Any).unwrap();
    assert_eq!(matches, vec!["new jersey", "new york"]);

    // Under All every query has to match the tag
    let matches = pine.tags().fuzzy(["new", "york new"], 80, Scope::All).unwrap();
    assert_eq!(matches, vec!["new york"]);

    assert!(pine.tags().fuzzy("oak", 80, Scope::Any).unwrap().is_empty());
}

#[test]
fn test_facets_through_trait() {
    fn tag_everything<T: Tagged>(item: &T) {
        item.tags().add("catalogued").unwrap();
    }

    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    tag_everything(&oak);
    assert!(oak.tags().contains("catalogued").unwrap());
}
