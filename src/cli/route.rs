//! CLI route: single route table and run context. Dispatches to the entity,
//! collection, and discovery layers and to presentation.

use crate::backend::BackendRegistry;
use crate::categories::CategoryValue;
use crate::cli::command_name;
use crate::cli::parse::{CatCommands, Commands, OutputFormat, TagCommands};
use crate::cli::presentation::{
    format_categories, format_entity_table, format_fuzzy_matches, format_groups,
    format_init_summary, format_tags,
};
use crate::collection::Collection;
use crate::config::{ConfigLoader, GroveConfig};
use crate::discovery::{Discovery, FsDiscovery};
use crate::document::Scalar;
use crate::entity::{Entity, EntityBuilder};
use crate::error::ApiError;
use crate::tags::{Scope, TagQuery};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, resolved config, registry.
pub struct RunContext {
    workspace_root: PathBuf,
    config: GroveConfig,
    registry: Arc<BackendRegistry>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: GroveConfig) -> Result<Self, ApiError> {
        let registry = Arc::new(config.registry()?);
        Ok(Self {
            workspace_root,
            config,
            registry,
        })
    }

    pub fn config(&self) -> &GroveConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let name = command_name(command);
        debug!(command = %name, "Executing command");
        let result = self.execute_inner(command);
        match &result {
            Ok(_) => info!(command = %name, "Command completed"),
            Err(e) => debug!(command = %name, error = %e, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Init {
                path,
                backend,
                new,
                tags,
                categories,
            } => self.handle_init(path, backend.as_deref(), *new, tags, categories),
            Commands::Tags { command } => self.handle_tags(command),
            Commands::Cats { command } => self.handle_cats(command),
            Commands::Find {
                pattern,
                tags,
                any,
                not_all,
                fuzzy,
                threshold,
                format,
            } => {
                let selection = self.select(pattern.as_deref())?;
                let selection = filter_by_query(selection, tags, any, not_all)?;
                if let Some(term) = fuzzy {
                    let threshold = threshold.unwrap_or(self.config.query.fuzzy_threshold);
                    let matches = selection.tags().fuzzy(term.as_str(), threshold, Scope::Any)?;
                    return Ok(format_fuzzy_matches(&matches, *format));
                }
                let rows = selection
                    .iter()
                    .map(|entity| Ok((entity.clone(), entity.tags().list()?)))
                    .collect::<Result<Vec<_>, ApiError>>()?;
                Ok(format_entity_table(&rows, *format))
            }
            Commands::Groupby {
                keys,
                pattern,
                format,
            } => {
                let selection = self.select(pattern.as_deref())?;
                let groups = selection.categories().groupby(keys.clone())?;
                Ok(format_groups(&groups, *format))
            }
        }
    }

    fn handle_init(
        &self,
        path: &Path,
        backend: Option<&str>,
        new: bool,
        tags: &[String],
        categories: &[String],
    ) -> Result<String, ApiError> {
        let entries = parse_entries(categories)?;
        let mut builder = EntityBuilder::new(path)
            .new_entity(new)
            .lock_options(self.config.lock_options())
            .tags(tags.to_vec())
            .categories(entries);
        if let Some(backend) = backend {
            builder = builder.backend(backend);
        }
        let entity = builder.open(&self.registry)?;
        let document = entity.document()?;
        Ok(format_init_summary(&entity, &document))
    }

    fn handle_tags(&self, command: &TagCommands) -> Result<String, ApiError> {
        match command {
            TagCommands::Add { path, tags } => {
                let entity = self.open(path)?;
                entity.tags().add(tags.clone())?;
                Ok(format_tags(&entity.tags().list()?, OutputFormat::Text))
            }
            TagCommands::Remove { path, tags } => {
                let entity = self.open(path)?;
                entity.tags().remove(tags.clone())?;
                Ok(format_tags(&entity.tags().list()?, OutputFormat::Text))
            }
            TagCommands::List { path, format } => {
                let entity = self.open(path)?;
                Ok(format_tags(&entity.tags().list()?, *format))
            }
            TagCommands::Clear { path } => {
                let entity = self.open(path)?;
                entity.tags().clear()?;
                Ok(format!("Cleared tags of {}", entity))
            }
        }
    }

    fn handle_cats(&self, command: &CatCommands) -> Result<String, ApiError> {
        match command {
            CatCommands::Set { path, entries } => {
                let entity = self.open(path)?;
                entity.categories().add(parse_entries(entries)?)?;
                Ok(format_categories(&entity.categories().to_map()?, OutputFormat::Text))
            }
            CatCommands::Remove { path, keys } => {
                let entity = self.open(path)?;
                entity.categories().remove(keys.clone())?;
                Ok(format_categories(&entity.categories().to_map()?, OutputFormat::Text))
            }
            CatCommands::List { path, format } => {
                let entity = self.open(path)?;
                Ok(format_categories(&entity.categories().to_map()?, *format))
            }
        }
    }

    /// Attach to an existing entity without creating one.
    fn open(&self, path: &Path) -> Result<Entity, ApiError> {
        if path.is_dir() && crate::entity::state_files_in(path, &self.registry)?.is_empty() {
            return Err(ApiError::KeyNotFound(format!(
                "no entity at {} (run `grove init` first)",
                path.display()
            )));
        }
        if !path.exists() {
            return Err(ApiError::KeyNotFound(format!("no entity at {}", path.display())));
        }
        EntityBuilder::new(path)
            .lock_options(self.config.lock_options())
            .open(&self.registry)
    }

    fn discovery(&self) -> FsDiscovery {
        FsDiscovery::new(&self.workspace_root, Arc::clone(&self.registry))
            .with_config(self.config.discovery_config())
            .with_lock_options(self.config.lock_options())
    }

    /// Entities matching `pattern`, or every entity under the workspace.
    fn select(&self, pattern: Option<&str>) -> Result<Collection, ApiError> {
        let discovery = self.discovery();
        let entities = match pattern {
            Some(pattern) => discovery.resolve(pattern)?,
            None => discovery.discover()?,
        };
        Ok(Collection::from_entities(entities))
    }
}

fn filter_by_query(
    selection: Collection,
    all: &[String],
    any: &[String],
    not_all: &[String],
) -> Result<Collection, ApiError> {
    let mut selection = selection;
    if !all.is_empty() {
        selection = selection.tags().filter(TagQuery::all(all))?;
    }
    if !any.is_empty() {
        selection = selection.tags().filter(TagQuery::any(any))?;
    }
    if !not_all.is_empty() {
        selection = selection.tags().filter(TagQuery::not_all(not_all))?;
    }
    Ok(selection)
}

/// Parse `key=value` arguments into category entries.
pub fn parse_entries(raw: &[String]) -> Result<Vec<(String, CategoryValue)>, ApiError> {
    raw.iter()
        .map(|entry| {
            let (key, value) = entry.split_once('=').ok_or_else(|| {
                ApiError::TypeMismatch(format!("expected key=value, got '{}'", entry))
            })?;
            Ok((key.to_string(), CategoryValue::from(Scalar::parse_literal(value))))
        })
        .collect()
}
