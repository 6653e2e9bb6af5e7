//! Several handles and threads working on one entity

use super::test_utils::entity;
use grove::{ApiError, BackendRegistry, Entity, EntityBuilder, LockOptions};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_no_lost_updates_between_handles() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    let path = oak.path().to_path_buf();

    let workers = 4;
    let per_worker = 10;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Each thread gets its own handle, so only the lock file orders them
                let own = Entity::open(&path).unwrap();
                barrier.wait();
                for i in 0..per_worker {
                    own.tags().add(format!("w{}-{}", w, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(oak.tags().len().unwrap(), workers * per_worker);
}

#[test]
fn test_shared_handle_across_threads() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");

    thread::scope(|scope| {
        for w in 0..3 {
            let oak = &oak;
            scope.spawn(move || {
                for i in 0..5 {
                    oak.guard()
                        .modify(|doc| {
                            doc.tags.push(format!("s{}-{}", w, i));
                            Ok(())
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(oak.tags().len().unwrap(), 15);
}

#[test]
fn test_readers_never_see_partial_replacement() {
    let temp_dir = TempDir::new().unwrap();
    let oak = entity(temp_dir.path(), "oak");
    let first = vec!["a1", "a2", "a3"];
    let second = vec!["b1", "b2", "b3"];
    oak.tags().replace(first.clone()).unwrap();

    let reader = Entity::open(oak.path()).unwrap();
    thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..30 {
                let next = if round % 2 == 0 { &second } else { &first };
                oak.tags().replace(next.clone()).unwrap();
            }
        });
        scope.spawn(|| {
            for _ in 0..60 {
                let seen = reader.tags().list().unwrap();
                assert!(
                    seen == first || seen == second,
                    "reader saw a mixed tag set: {:?}",
                    seen
                );
            }
        });
    });
}

#[test]
fn test_lock_timeout_against_another_handle() {
    let temp_dir = TempDir::new().unwrap();
    let registry = BackendRegistry::standard();
    let options = LockOptions {
        timeout: Some(Duration::from_millis(50)),
        poll_interval: Duration::from_millis(5),
    };

    let holder = entity(temp_dir.path(), "oak");
    let waiter = EntityBuilder::new(holder.path())
        .lock_options(options)
        .open(&registry)
        .unwrap();
    assert_eq!(waiter, holder);

    let token = holder.guard().acquire_write().unwrap();
    assert!(matches!(
        waiter.tags().add("late"),
        Err(ApiError::LockTimeout { mode: "write", .. })
    ));
    assert!(matches!(
        waiter.tags().list(),
        Err(ApiError::LockTimeout { mode: "read", .. })
    ));
    drop(token);

    waiter.tags().add("late").unwrap();
    assert!(holder.tags().contains("late").unwrap());
}
