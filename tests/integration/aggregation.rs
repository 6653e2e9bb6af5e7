//! Aggregated tag and category views over collections

use super::test_utils::{collection_of, s, some};
use grove::{ApiError, Collection, Entity, Scalar, Scope, TagQuery};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use tempfile::TempDir;

/// maple and pine, tagged as trees from two states
fn maple_and_pine(temp_dir: &TempDir) -> (Collection, Entity, Entity) {
    let (collection, trees) = collection_of(temp_dir.path(), &["maple", "pine"]);
    trees[0].tags().add(["tree", "new jersey", "deciduous"]).unwrap();
    trees[1].tags().add(["tree", "new york", "evergreen"]).unwrap();
    (collection, trees[0].clone(), trees[1].clone())
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_any_and_all() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, _, _) = maple_and_pine(&temp_dir);
    let tags = collection.tags();

    assert_eq!(tags.any().unwrap().len(), 5);
    assert_eq!(tags.all().unwrap(), set(&["tree"]));
    assert!(tags.all().unwrap().is_subset(&tags.any().unwrap()));
    assert_eq!(tags.len().unwrap(), 1);

    assert!(Collection::new().tags().all().unwrap().is_empty());
}

#[test]
fn test_tag_present_on_one_member() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, trees) = collection_of(temp_dir.path(), &["maple", "sequoia", "elm"]);
    trees[1].tags().add("redwood").unwrap();

    let tags = collection.tags();
    assert!(tags.any().unwrap().contains("redwood"));
    assert!(!tags.all().unwrap().contains("redwood"));
    assert_eq!(tags.query("redwood").unwrap(), vec![false, true, false]);
}

#[test]
fn test_query_masks() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, _, _) = maple_and_pine(&temp_dir);
    let tags = collection.tags();

    assert_eq!(tags.query("tree").unwrap(), vec![true, true]);
    assert_eq!(tags.query("deciduous").unwrap(), vec![true, false]);
    assert_eq!(tags.query(TagQuery::not_all(["tree"])).unwrap(), vec![false, false]);
    assert_eq!(tags.query(TagQuery::not_all(["new york"])).unwrap(), vec![true, false]);

    assert_eq!(tags.query(TagQuery::all(["tree", "deciduous"])).unwrap(), vec![true, false]);
    assert_eq!(tags.query(TagQuery::all(["new jersey", "evergreen"])).unwrap(), vec![false, false]);

    assert_eq!(tags.query(TagQuery::any(["tree", "deciduous"])).unwrap(), vec![true, true]);
    assert_eq!(tags.query(TagQuery::any(["new york", "evergreen"])).unwrap(), vec![false, true]);

    assert_eq!(
        tags.query(TagQuery::not_all(["deciduous", "evergreen"])).unwrap(),
        vec![true, true]
    );
    assert_eq!(
        tags.query(TagQuery::not_all(["tree", "new york", "evergreen"])).unwrap(),
        vec![true, false]
    );

    // evergreen or in NY, and not a tree
    let query = TagQuery::all([
        TagQuery::any(["evergreen", "new york"]),
        TagQuery::not_all(["tree"]),
    ]);
    assert_eq!(tags.query(&query).unwrap(), vec![false, false]);

    // not a tree in NJ, and deciduous
    let query = TagQuery::all([TagQuery::not_all(["tree", "new jersey"]), TagQuery::tag("deciduous")]);
    assert_eq!(tags.query(&query).unwrap(), vec![false, false]);
}

#[test]
fn test_filter() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, maple, pine) = maple_and_pine(&temp_dir);
    let tags = collection.tags();
    let just_maple = Collection::from(&maple);
    let just_pine = Collection::from(&pine);

    assert_eq!(tags.filter("tree").unwrap(), collection);
    assert_eq!(tags.filter(TagQuery::not_all(["tree"])).unwrap(), Collection::new());
    assert_eq!(tags.filter("evergreen").unwrap(), just_pine);
    assert_eq!(tags.filter(TagQuery::not_all(["new york"])).unwrap(), just_maple);
    assert_eq!(tags.filter(TagQuery::all(["deciduous", "new york"])).unwrap(), Collection::new());
    assert_eq!(tags.filter(TagQuery::any(["evergreen", "new york"])).unwrap(), just_pine);
    assert_eq!(tags.filter(TagQuery::not_all(["evergreen", "tree"])).unwrap(), just_maple);

    // a tree in NJ, or anything not evergreen
    let query = TagQuery::any([
        TagQuery::all(["tree", "new jersey"]),
        TagQuery::not_all(["evergreen"]),
    ]);
    assert_eq!(tags.filter(&query).unwrap(), just_maple);
}

#[test]
fn test_fuzzy_scopes_and_thresholds() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, _, _) = maple_and_pine(&temp_dir);
    let tags = collection.tags();

    assert_eq!(tags.fuzzy("tree", 80, Scope::All).unwrap(), vec!["tree"]);
    assert_eq!(tags.fuzzy("deciduous", 80, Scope::Any).unwrap(), vec!["deciduous"]);
    assert!(tags.fuzzy("evergreen", 80, Scope::All).unwrap().is_empty());

    // An exact tag shared by every member matches at any threshold
    assert_eq!(tags.fuzzy("tree", 99, Scope::All).unwrap(), vec!["tree"]);
    assert_eq!(tags.fuzzy("tree", 0, Scope::All).unwrap(), vec!["tree"]);

    assert!(tags.fuzzy("new york", 80, Scope::All).unwrap().is_empty());
    assert_eq!(tags.fuzzy("new york", 80, Scope::Any).unwrap(), vec!["new york"]);
    let tolerant: HashSet<String> = tags
        .fuzzy("new york", 50, Scope::Any)
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(
        tolerant,
        HashSet::from(["new york".to_string(), "new jersey".to_string()])
    );

    // Several queries
    assert!(tags.fuzzy(["new", "evergreen"], 80, Scope::All).unwrap().is_empty());
    assert_eq!(tags.fuzzy(["new", "evergreen"], 30, Scope::All).unwrap(), vec!["tree"]);
    assert_eq!(tags.fuzzy(["new", "tree"], 90, Scope::Any).unwrap(), vec!["tree"]);

    let wide: BTreeSet<String> = tags
        .fuzzy(["new", "tree"], 80, Scope::Any)
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(wide, set(&["new jersey", "new york", "tree"]));

    let nj_decid: BTreeSet<String> = tags
        .fuzzy(["new jersey", "decid"], 80, Scope::Any)
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(nj_decid, set(&["deciduous", "new jersey"]));
}

#[test]
fn test_tag_set_algebra() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, trees) = collection_of(temp_dir.path(), &["maple", "pine", "juniper"]);
    trees[0].tags().add(["tree", "new jersey", "deciduous"]).unwrap();
    trees[1].tags().add(["tree", "new york", "evergreen"]).unwrap();
    trees[2].tags().add(["shrub", "new york", "evergreen"]).unwrap();

    let all_trees = collection.take(&[0, 1]).unwrap();
    let evergreens = collection.take(&[1, 2]).unwrap();

    assert_eq!(
        evergreens.tags().union(&all_trees.tags()).unwrap(),
        set(&["evergreen", "new york", "tree"])
    );
    assert_eq!(
        evergreens.tags().intersect(trees[2].tags()).unwrap(),
        set(&["evergreen", "new york"])
    );
    assert_eq!(
        all_trees.tags().symmetric_difference(&evergreens.tags()).unwrap(),
        set(&["evergreen", "new york", "tree"])
    );
    assert_eq!(
        evergreens.tags().symmetric_difference(trees[2].tags()).unwrap(),
        set(&["shrub"])
    );
    assert_eq!(
        evergreens.tags().difference_from(set(&["new york", "oak"])).unwrap(),
        set(&["oak"])
    );
    assert!(evergreens.tags().is_subset_of(trees[2].tags()).unwrap());
    assert!(!evergreens.tags().set_eq(trees[2].tags()).unwrap());

    // Lists are not set operands
    assert!(matches!(
        all_trees.tags().set_eq("tree"),
        Err(ApiError::TypeMismatch(_))
    ));
}

#[test]
fn test_collective_tag_edits() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, trees) = collection_of(temp_dir.path(), &["maple", "pine"]);

    collection.tags().add(["tree", "alive"]).unwrap();
    for member in &trees {
        assert_eq!(member.tags().list().unwrap(), vec!["alive", "tree"]);
    }

    collection.tags().remove("alive").unwrap();
    assert_eq!(collection.tags().all().unwrap(), set(&["tree"]));

    collection.tags().replace(["stump"]).unwrap();
    assert_eq!(collection.tags().any().unwrap(), set(&["stump"]));

    collection.tags().clear().unwrap();
    assert!(collection.tags().any().unwrap().is_empty());
}

/// The four-member fixture: two plain entities plus maple and sequoia
fn four_trees(temp_dir: &TempDir) -> (Collection, Vec<Entity>) {
    let (mut collection, trees) = collection_of(temp_dir.path(), &["birch", "aspen"]);
    collection
        .categories()
        .add([("age", json!(42)), ("bark", json!("smooth"))])
        .unwrap();

    let (_, more) = collection_of(temp_dir.path(), &["maple", "sequoia"]);
    more[0]
        .categories()
        .add([("age", json!("seedling")), ("bark", json!("rough")), ("type", json!("deciduous"))])
        .unwrap();
    more[1]
        .categories()
        .add([
            ("age", json!("adult")),
            ("bark", json!("rough")),
            ("type", json!("evergreen")),
            ("nickname", json!("redwood")),
        ])
        .unwrap();
    collection.add(more.clone()).unwrap();

    let all = trees.into_iter().chain(more).collect();
    (collection, all)
}

#[test]
fn test_categories_getitem() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, _) = four_trees(&temp_dir);
    let categories = collection.categories();

    assert_eq!(categories.len().unwrap(), 2);
    assert_eq!(categories.any().unwrap().len(), 4);

    let ages = vec![Some(Scalar::Int(42)), Some(Scalar::Int(42)), some("seedling"), some("adult")];
    assert_eq!(categories.get("age").unwrap(), ages);
    let types = vec![None, None, some("deciduous"), some("evergreen")];
    assert_eq!(categories.get("type").unwrap(), types);
    let nicknames = vec![None, None, None, some("redwood")];
    assert_eq!(categories.get("nickname").unwrap(), nicknames);

    assert_eq!(
        categories.get_list(&["age", "type"]).unwrap(),
        vec![ages.clone(), types.clone()]
    );

    let by_key = categories.get_map(["bark", "nickname"]).unwrap();
    assert_eq!(
        by_key["bark"],
        vec![some("smooth"), some("smooth"), some("rough"), some("rough")]
    );
    assert_eq!(by_key["nickname"], nicknames);
}

#[test]
fn test_categories_setitem() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, members) = four_trees(&temp_dir);
    let categories = collection.categories();

    categories.set("age", "old").unwrap();
    assert_eq!(categories.get("age").unwrap(), vec![some("old"); 4]);

    assert!(!categories.any().unwrap().contains_key("location"));
    categories.set("location", "USA").unwrap();
    assert_eq!(categories.get("location").unwrap(), vec![some("USA"); 4]);

    assert!(categories.any().unwrap().contains_key("nickname"));
    assert!(!categories.contains_key("nickname").unwrap());
    categories.set("nickname", "friend").unwrap();
    assert_eq!(categories.get("nickname").unwrap(), vec![some("friend"); 4]);

    let ice_creams = vec!["rocky road", "americone dream", "moose tracks", "vanilla"];
    categories.set_each("favorite ice cream", ice_creams.clone()).unwrap();
    for (member, flavor) in members.iter().zip(&ice_creams) {
        assert_eq!(member.categories().get("favorite ice cream").unwrap(), s(flavor));
    }

    assert!(matches!(
        categories.set_each("rank", vec![1, 2]),
        Err(ApiError::TypeMismatch(_))
    ));
}

#[test]
fn test_categories_all_any_and_remove() {
    let temp_dir = TempDir::new().unwrap();
    let (mut collection, _) = collection_of(temp_dir.path(), &["birch", "aspen"]);
    collection
        .categories()
        .add([("age", json!(42)), ("bark", json!("bare"))])
        .unwrap();

    let (_, hickory) = collection_of(temp_dir.path(), &["hickory"]);
    hickory[0]
        .categories()
        .add([("bark", "shaggy"), ("species", "ovata")])
        .unwrap();
    collection.add(&hickory[0]).unwrap();
    collection.add(&hickory[0]).unwrap();
    assert_eq!(collection.len(), 3);

    let common = collection.categories().all().unwrap();
    assert_eq!(common.len(), 1);
    assert_eq!(common["bark"], vec![s("bare"), s("bare"), s("shaggy")]);

    let every = collection.categories().any().unwrap();
    assert_eq!(every.len(), 3);
    assert_eq!(every["age"], vec![Some(Scalar::Int(42)), Some(Scalar::Int(42)), None]);
    assert_eq!(every["species"], vec![None, None, some("ovata")]);

    collection.categories().set("location", "USA").unwrap();
    assert_eq!(collection.categories().len().unwrap(), 2);

    hickory[0].categories().set("age", "sprout").unwrap();
    assert_eq!(
        collection.categories().get("age").unwrap(),
        vec![Some(Scalar::Int(42)), Some(Scalar::Int(42)), some("sprout")]
    );

    collection.categories().remove(["bark"]).unwrap();
    let every = collection.categories().any().unwrap();
    assert_eq!(every.len(), 3);
    assert!(!every.contains_key("bark"));
    assert_eq!(collection.categories().keys(Scope::All).unwrap(), vec!["age", "location"]);

    collection.categories().remove(["age"]).unwrap();
    for member in &collection {
        assert!(!member.categories().contains_key("age").unwrap());
    }
}

#[test]
fn test_keys_and_values_align() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, _) = four_trees(&temp_dir);
    let categories = collection.categories();

    for scope in [Scope::All, Scope::Any] {
        let keys = categories.keys(scope).unwrap();
        let values = categories.values(scope).unwrap();
        assert_eq!(keys.len(), values.len());
        for (key, value) in keys.iter().zip(values) {
            assert_eq!(categories.get(key).unwrap(), value);
        }
    }
    assert_eq!(categories.keys(Scope::All).unwrap(), vec!["age", "bark"]);
    assert_eq!(
        categories.keys(Scope::Any).unwrap(),
        vec!["age", "bark", "nickname", "type"]
    );
}

#[test]
fn test_groupby() {
    let temp_dir = TempDir::new().unwrap();
    let (collection, t) = collection_of(temp_dir.path(), &["maple", "sequoia", "elm", "oak"]);
    t[0].categories()
        .add([("age", "young"), ("bark", "smooth"), ("type", "deciduous")])
        .unwrap();
    t[1].categories()
        .add([("age", "adult"), ("bark", "fibrous"), ("type", "evergreen"), ("nickname", "redwood")])
        .unwrap();
    t[2].categories()
        .add([("age", "old"), ("bark", "mossy"), ("type", "deciduous"), ("health", "poor")])
        .unwrap();
    t[3].categories()
        .add([("age", "young"), ("bark", "mossy"), ("type", "deciduous"), ("health", "good")])
        .unwrap();

    let members = |c: &Collection| -> HashSet<Entity> { c.iter().cloned().collect() };
    let of = |items: &[&Entity]| -> HashSet<Entity> { items.iter().map(|e| (*e).clone()).collect() };
    let categories = collection.categories();

    let by_age = categories.groupby("age").unwrap();
    assert_eq!(by_age.len(), 3);
    assert_eq!(members(by_age.get("young").unwrap()), of(&[&t[0], &t[3]]));
    assert_eq!(members(by_age.get("adult").unwrap()), of(&[&t[1]]));
    assert_eq!(members(by_age.get("old").unwrap()), of(&[&t[2]]));

    let by_type = categories.groupby("type").unwrap();
    assert_eq!(members(by_type.get("deciduous").unwrap()), of(&[&t[0], &t[2], &t[3]]));

    let by_health = categories.groupby("health").unwrap();
    assert_eq!(by_health.len(), 2);
    for group in by_health.values() {
        assert!(!group.contains(&t[0]) && !group.contains(&t[1]));
    }

    let age_bark = categories.groupby(["age", "bark"]).unwrap();
    assert_eq!(age_bark.len(), 4);
    assert_eq!(members(age_bark.get(["young", "mossy"]).unwrap()), of(&[&t[3]]));

    let health_type = categories.groupby(["health", "type"]).unwrap();
    assert_eq!(health_type.len(), 2);
    assert_eq!(members(health_type.get(["poor", "deciduous"]).unwrap()), of(&[&t[2]]));

    let age_nick = categories.groupby(["age", "nickname"]).unwrap();
    assert_eq!(age_nick.len(), 1);
    assert_eq!(members(age_nick.get(["adult", "redwood"]).unwrap()), of(&[&t[1]]));

    let abtn = categories.groupby(["bark", "nickname", "type", "age"]).unwrap();
    assert_eq!(abtn.len(), 1);
    assert!(abtn.get(["fibrous", "redwood", "evergreen", "adult"]).is_some());

    assert!(categories.groupby(["health", "nickname"]).unwrap().is_empty());

    // Order of grouping keys matters, so sets are refused
    let unordered: BTreeSet<String> = set(&["health", "nickname"]);
    assert!(matches!(
        categories.groupby(unordered),
        Err(ApiError::TypeMismatch(_))
    ));
}
