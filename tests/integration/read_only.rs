//! Entities on storage that refuses writes
#![cfg(unix)]

use super::test_utils::entity;
use grove::{Access, ApiError, Entity};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

/// Restores write permission on drop so the temp dir can be cleaned up.
struct Frozen {
    paths: Vec<(PathBuf, u32)>,
}

impl Frozen {
    fn new(files: &[&Path], dir: &Path) -> Self {
        let mut paths = Vec::new();
        for file in files {
            set_mode(file, 0o444);
            paths.push((file.to_path_buf(), 0o644));
        }
        set_mode(dir, 0o555);
        paths.push((dir.to_path_buf(), 0o755));
        Self { paths }
    }

    /// Privileged users write through permission bits.
    fn is_enforced(&self, dir: &Path) -> bool {
        let probe = dir.join(".probe");
        match fs::File::create(&probe) {
            Ok(_) => {
                let _ = fs::remove_file(&probe);
                false
            }
            Err(_) => true,
        }
    }
}

impl Drop for Frozen {
    fn drop(&mut self) {
        for (path, mode) in self.paths.iter().rev() {
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(*mode));
        }
    }
}

#[test]
fn test_read_only_entity_reads_but_refuses_writes() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    oak.tags().add(["tree", "acorns"]).unwrap();
    oak.categories().set("age", 42).unwrap();

    let lock_path = oak.guard().lock_path().to_path_buf();
    let frozen = Frozen::new(&[oak.state_path(), &lock_path], oak.path());
    if !frozen.is_enforced(oak.path()) {
        return;
    }

    let reopened = Entity::open(oak.path()).unwrap();
    assert_eq!(reopened.access(), Access::ReadOnly);
    assert!(reopened.is_read_only());
    assert_eq!(reopened, oak);

    assert_eq!(reopened.tags().list().unwrap(), vec!["acorns", "tree"]);
    assert_eq!(reopened.categories().len().unwrap(), 1);

    assert!(matches!(
        reopened.tags().add("pruned"),
        Err(ApiError::PermissionDenied(_))
    ));
    assert!(matches!(
        reopened.categories().set("age", 43),
        Err(ApiError::PermissionDenied(_))
    ));
    assert_eq!(reopened.tags().len().unwrap(), 2);
}

#[test]
fn test_read_only_entity_missing_a_field() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("stump");
    fs::create_dir(&dir).unwrap();
    let state_path = dir.join(format!("Entity.{}.json", uuid::Uuid::new_v4()));
    fs::write(&state_path, r#"{"tags": ["tree"]}"#).unwrap();

    let frozen = Frozen::new(&[&state_path], &dir);
    if !frozen.is_enforced(&dir) {
        return;
    }

    assert!(matches!(
        Entity::open(&dir),
        Err(ApiError::MissingState { field: "categories", .. })
    ));
}
