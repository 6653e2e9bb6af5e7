//! grove: tags and categories for filesystem directories
//!
//! Each entity is a directory holding one state file (`Entity.<uuid>.<ext>`)
//! with a list of tags and a map of scalar categories. Entities are grouped
//! into ordered collections that answer aggregate tag and category queries.
//! State file access goes through a reentrant reader/writer guard backed by
//! an advisory OS lock, so threads and processes can share entities.

pub mod aggregate;
pub mod backend;
pub mod categories;
pub mod cli;
pub mod collection;
pub mod config;
pub mod discovery;
pub mod document;
pub mod entity;
pub mod error;
pub mod fuzzy;
pub mod guard;
pub mod logging;
pub mod tags;

pub use aggregate::{AggCategories, AggTags, GroupKey, GroupKeys, Groups, MemberValues};
pub use backend::{Backend, BackendFactory, BackendRegistry};
pub use categories::{Categories, CategoryKey, CategoryValue};
pub use collection::{Collection, Lookup, Member, Selector};
pub use discovery::{Discovery, DiscoveryConfig, FsDiscovery};
pub use document::{CategoryMap, Document, Scalar};
pub use entity::{Categorized, Entity, EntityBuilder, Tagged};
pub use error::{ApiError, StorageError};
pub use guard::{Access, AccessGuard, LockOptions};
pub use tags::{FuzzyQuery, Scope, TagArg, TagOperand, TagQuery, Tags};
