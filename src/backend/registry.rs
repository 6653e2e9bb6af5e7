//! Backend registry: explicit mapping from backend names and state-file
//! extensions to constructors.
//!
//! Built once at process start and immutable afterwards. Entity construction
//! and discovery take a registry reference instead of consulting global state.

use super::{Backend, BinaryBackend, JsonBackend, TomlBackend, YamlBackend};
use crate::error::ApiError;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Prefix of every state file name: `Entity.<uuid>.<ext>`.
pub const STATE_FILE_PREFIX: &str = "Entity";

/// Constructor signature for a backend bound to a state file path.
pub type BackendConstructor = fn(&Path) -> Arc<dyn Backend>;

/// One registered backend
#[derive(Clone)]
pub struct BackendFactory {
    pub name: &'static str,
    pub extension: &'static str,
    constructor: BackendConstructor,
}

impl BackendFactory {
    pub fn new(name: &'static str, extension: &'static str, constructor: BackendConstructor) -> Self {
        Self {
            name,
            extension,
            constructor,
        }
    }

    /// Bind a backend instance to `path`.
    pub fn open(&self, path: &Path) -> Arc<dyn Backend> {
        (self.constructor)(path)
    }

    /// State file name for an entity with `uuid`.
    pub fn state_file_name(&self, uuid: &Uuid) -> String {
        format!("{}.{}.{}", STATE_FILE_PREFIX, uuid, self.extension)
    }
}

impl std::fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendFactory")
            .field("name", &self.name)
            .field("extension", &self.extension)
            .finish()
    }
}

/// Immutable set of available backends
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    factories: Vec<BackendFactory>,
    default_name: &'static str,
}

/// Builder for [`BackendRegistry`]
#[derive(Debug, Default)]
pub struct BackendRegistryBuilder {
    factories: Vec<BackendFactory>,
    default_name: Option<&'static str>,
}

impl BackendRegistryBuilder {
    /// Register a backend. A later registration with the same name replaces
    /// the earlier one.
    pub fn register(mut self, factory: BackendFactory) -> Self {
        self.factories.retain(|f| f.name != factory.name);
        self.factories.push(factory);
        self
    }

    /// Name of the backend used for new entities.
    pub fn default_backend(mut self, name: &'static str) -> Self {
        self.default_name = Some(name);
        self
    }

    pub fn build(self) -> Result<BackendRegistry, ApiError> {
        if self.factories.is_empty() {
            return Err(ApiError::ConfigError(
                "Backend registry needs at least one backend".to_string(),
            ));
        }
        let default_name = self.default_name.unwrap_or(self.factories[0].name);
        if !self.factories.iter().any(|f| f.name == default_name) {
            return Err(ApiError::UnknownBackend(default_name.to_string()));
        }
        Ok(BackendRegistry {
            factories: self.factories,
            default_name,
        })
    }
}

impl BackendRegistry {
    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// Registry holding every built-in backend, with JSON as the default.
    pub fn standard() -> Self {
        Self {
            factories: vec![
                BackendFactory::new(JsonBackend::NAME, JsonBackend::EXTENSION, JsonBackend::open),
                BackendFactory::new(YamlBackend::NAME, YamlBackend::EXTENSION, YamlBackend::open),
                BackendFactory::new(BinaryBackend::NAME, BinaryBackend::EXTENSION, BinaryBackend::open),
                BackendFactory::new(TomlBackend::NAME, TomlBackend::EXTENSION, TomlBackend::open),
            ],
            default_name: JsonBackend::NAME,
        }
    }

    /// Copy of this registry with a different default backend.
    pub fn with_default(&self, name: &str) -> Result<Self, ApiError> {
        let factory = self.get(name)?;
        Ok(Self {
            factories: self.factories.clone(),
            default_name: factory.name,
        })
    }

    /// Look up a backend by registry name.
    pub fn get(&self, name: &str) -> Result<&BackendFactory, ApiError> {
        self.factories
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ApiError::UnknownBackend(name.to_string()))
    }

    pub fn default_factory(&self) -> &BackendFactory {
        self.factories
            .iter()
            .find(|f| f.name == self.default_name)
            .unwrap_or(&self.factories[0])
    }

    pub fn for_extension(&self, extension: &str) -> Option<&BackendFactory> {
        self.factories.iter().find(|f| f.extension == extension)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name).collect()
    }

    /// Recognize a state file path, returning its UUID and backend.
    ///
    /// Returns `None` for anything not named `Entity.<uuid>.<ext>` with a
    /// registered extension.
    pub fn parse_state_file(&self, path: &Path) -> Option<(Uuid, &BackendFactory)> {
        let name = path.file_name()?.to_str()?;
        let rest = name.strip_prefix(STATE_FILE_PREFIX)?.strip_prefix('.')?;
        let (uuid_part, extension) = rest.rsplit_once('.')?;
        let uuid = Uuid::parse_str(uuid_part).ok()?;
        let factory = self.for_extension(extension)?;
        Some((uuid, factory))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
