//! Entity: a directory carrying one persisted metadata document.
//!
//! An entity is identified by the UUID embedded in its state file name
//! (`Entity.<uuid>.<ext>`). Its facets (tags and categories) are built once at
//! construction and share the entity's [`AccessGuard`].

use crate::backend::BackendRegistry;
use crate::categories::{Categories, CategoryKey, CategoryValue};
use crate::document::Document;
use crate::error::{ApiError, StorageError};
use crate::guard::{Access, AccessGuard, LockOptions};
use crate::tags::{TagArg, Tags};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Entity with a tag facet
pub trait Tagged {
    fn tags(&self) -> &Tags;
}

/// Entity with a category facet
pub trait Categorized {
    fn categories(&self) -> &Categories;
}

struct EntityInner {
    uuid: Uuid,
    dir: PathBuf,
    state_path: PathBuf,
    backend_name: &'static str,
    access: Access,
    guard: Arc<AccessGuard>,
    tags: Tags,
    categories: Categories,
}

/// Handle to one entity
///
/// Cloning is cheap; clones share the same guard. Equality and hashing go by
/// UUID.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Open or create the entity at `path` with the standard registry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ApiError> {
        EntityBuilder::new(path).open(&BackendRegistry::standard())
    }

    pub fn builder<P: AsRef<Path>>(path: P) -> EntityBuilder {
        EntityBuilder::new(path)
    }

    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    /// Directory name.
    pub fn name(&self) -> String {
        self.inner
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Entity directory.
    pub fn path(&self) -> &Path {
        &self.inner.dir
    }

    pub fn state_path(&self) -> &Path {
        &self.inner.state_path
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name
    }

    pub fn access(&self) -> Access {
        self.inner.access
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.access == Access::ReadOnly
    }

    pub fn guard(&self) -> &Arc<AccessGuard> {
        &self.inner.guard
    }

    pub fn tags(&self) -> &Tags {
        &self.inner.tags
    }

    pub fn categories(&self) -> &Categories {
        &self.inner.categories
    }

    /// Current document snapshot.
    pub fn document(&self) -> Result<Document, ApiError> {
        self.inner.guard.read(|doc| doc.clone())
    }

    fn assemble(
        uuid: Uuid,
        dir: PathBuf,
        state_path: PathBuf,
        backend_name: &'static str,
        guard: Arc<AccessGuard>,
        access: Access,
    ) -> Self {
        let tags = Tags::new(Arc::clone(&guard));
        let categories = Categories::new(Arc::clone(&guard));
        Self {
            inner: Arc::new(EntityInner {
                uuid,
                dir,
                state_path,
                backend_name,
                access,
                guard,
                tags,
                categories,
            }),
        }
    }
}

impl Tagged for Entity {
    fn tags(&self) -> &Tags {
        &self.inner.tags
    }
}

impl Categorized for Entity {
    fn categories(&self) -> &Categories {
        &self.inner.categories
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uuid == other.inner.uuid
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.uuid.hash(state);
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name())
            .field("uuid", &self.inner.uuid)
            .field("backend", &self.inner.backend_name)
            .finish()
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Entity: '{}'>", self.name())
    }
}

/// Options for opening or creating an entity
///
/// `path` may name a state file, or a directory. A directory holding exactly
/// one state file opens it; a directory with none gets a new one; more than
/// one is ambiguous unless `new_entity` is set.
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    path: PathBuf,
    backend: Option<String>,
    new: bool,
    lock: LockOptions,
    pending_tags: Option<TagArg>,
    pending_categories: Vec<(CategoryKey, CategoryValue)>,
}

impl EntityBuilder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            backend: None,
            new: false,
            lock: LockOptions::default(),
            pending_tags: None,
            pending_categories: Vec::new(),
        }
    }

    /// Backend for a newly created state file; defaults to the registry's.
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backend = Some(name.into());
        self
    }

    /// Always create a fresh state file, even if the directory has one.
    pub fn new_entity(mut self, new: bool) -> Self {
        self.new = new;
        self
    }

    pub fn lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    /// Tags added once the entity is open.
    pub fn tags(mut self, tags: impl Into<TagArg>) -> Self {
        self.pending_tags = Some(tags.into());
        self
    }

    /// Categories added once the entity is open.
    pub fn categories<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<CategoryKey>,
        V: Into<CategoryValue>,
    {
        self.pending_categories
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Open (or create) the entity and apply any pending tags and categories.
    pub fn open(self, registry: &BackendRegistry) -> Result<Entity, ApiError> {
        let entity = self.resolve(registry)?;
        if let Some(tags) = self.pending_tags {
            entity.tags().add(tags)?;
        }
        if !self.pending_categories.is_empty() {
            entity.categories().add(self.pending_categories)?;
        }
        Ok(entity)
    }

    fn resolve(&self, registry: &BackendRegistry) -> Result<Entity, ApiError> {
        let path = absolute(&self.path)?;

        // Step 1: an explicit state file
        if path.is_file() {
            let (uuid, factory) = registry.parse_state_file(&path).ok_or_else(|| {
                ApiError::UnknownBackend(format!("{} is not a state file", path.display()))
            })?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return self.attach(uuid, dir, path.clone(), factory.name, factory.open(&path), false);
        }

        // Step 2: a directory that already holds a state file
        if !self.new && path.is_dir() {
            let mut existing = state_files_in(&path, registry)?;
            if existing.len() > 1 {
                return Err(ApiError::MultipleMatchesFound {
                    dir: path,
                    files: existing,
                });
            }
            if let Some(state_path) = existing.pop() {
                if let Some((uuid, factory)) = registry.parse_state_file(&state_path) {
                    let backend = factory.open(&state_path);
                    return self.attach(uuid, path, state_path, factory.name, backend, false);
                }
            }
        }

        // Step 3: a new state file
        let factory = match &self.backend {
            Some(name) => registry.get(name)?,
            None => registry.default_factory(),
        };
        fs::create_dir_all(&path).map_err(|e| StorageError::from_io(&path, e))?;
        let uuid = Uuid::new_v4();
        let state_path = path.join(factory.state_file_name(&uuid));
        let backend = factory.open(&state_path);
        self.attach(uuid, path, state_path, factory.name, backend, true)
    }

    fn attach(
        &self,
        uuid: Uuid,
        dir: PathBuf,
        state_path: PathBuf,
        backend_name: &'static str,
        backend: Arc<dyn crate::backend::Backend>,
        created: bool,
    ) -> Result<Entity, ApiError> {
        let guard = Arc::new(AccessGuard::with_options(backend, self.lock));
        let access = guard.initialize(&Document::new())?;

        if created {
            info!(uuid = %uuid, path = %dir.display(), backend = backend_name, "Created entity");
        } else {
            debug!(uuid = %uuid, path = %dir.display(), ?access, "Opened entity");
        }

        Ok(Entity::assemble(uuid, dir, state_path, backend_name, guard, access))
    }
}

/// State files directly inside `dir`, sorted by path.
pub(crate) fn state_files_in(dir: &Path, registry: &BackendRegistry) -> Result<Vec<PathBuf>, ApiError> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::from_io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && registry.parse_state_file(p).is_some())
        .collect();
    files.sort();
    Ok(files)
}

fn absolute(path: &Path) -> Result<PathBuf, ApiError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(StorageError::IoError)?;
    Ok(cwd.join(path))
}
