//! Every backend must persist the same documents the same way

use grove::backend::{BinaryBackend, JsonBackend, TomlBackend, YamlBackend};
use grove::{Backend, BackendRegistry, CategoryMap, Document, Scalar, StorageError};
use proptest::collection::{btree_map, btree_set};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn all_backends(dir: &Path) -> Vec<Arc<dyn Backend>> {
    vec![
        JsonBackend::open(&dir.join("Entity.a.json")),
        YamlBackend::open(&dir.join("Entity.a.yml")),
        BinaryBackend::open(&dir.join("Entity.a.bin")),
        TomlBackend::open(&dir.join("Entity.a.toml")),
    ]
}

fn scalar_strategy() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        any::<bool>().prop_map(Scalar::Bool),
        any::<i64>().prop_map(Scalar::Int),
        // Exact binary fractions survive every text format unchanged
        (-1_000_000i32..1_000_000).prop_map(|n| Scalar::Float(f64::from(n) / 8.0)),
        "[a-z][a-z0-9 _-]{0,12}".prop_map(Scalar::Str),
        // Strings that look like other scalar types must stay strings
        prop_oneof![Just("true"), Just("42"), Just("3.5"), Just("null")]
            .prop_map(|s| Scalar::Str(s.to_string())),
    ]
}

fn document_strategy() -> impl Strategy<Value = Document> {
    (
        btree_set("[a-z][a-z0-9 ]{0,10}", 0..6),
        btree_map("[a-z][a-z0-9_ ]{0,10}", scalar_strategy(), 0..6),
    )
        .prop_map(|(tags, categories)| Document {
            tags: tags.into_iter().collect(),
            categories: categories.into_iter().collect::<CategoryMap>(),
        })
}

#[test]
fn test_backends_persist_documents_exactly() {
    let mut runner = TestRunner::new(Config::with_cases(48));

    runner
        .run(&document_strategy(), |doc| {
            let temp_dir = TempDir::new().unwrap();
            for backend in all_backends(temp_dir.path()) {
                backend.write(&doc).unwrap();
                let read = backend.read().unwrap();
                prop_assert_eq!(&read, &doc, "backend {} changed the document", backend.name());
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_backends_create_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let mut first = Document::new();
    first.tags.push("tree".to_string());

    for backend in all_backends(temp_dir.path()) {
        assert!(!backend.exists());
        backend.create(&first).unwrap();
        backend.create(&Document::new()).unwrap();
        assert_eq!(backend.read().unwrap(), first, "backend {}", backend.name());
    }
}

#[test]
fn test_backends_report_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    for backend in all_backends(temp_dir.path()) {
        assert!(matches!(backend.read(), Err(StorageError::NotFound(_))));
    }
}

#[test]
fn test_registry_maps_every_extension() {
    let registry = BackendRegistry::standard();
    let temp_dir = TempDir::new().unwrap();
    for backend in all_backends(temp_dir.path()) {
        let extension = backend.path().extension().unwrap().to_str().unwrap().to_string();
        let factory = registry.for_extension(&extension).unwrap();
        assert_eq!(factory.name, backend.name());
    }
}
