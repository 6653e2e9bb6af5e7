//! Discovery: finding entities on the filesystem.
//!
//! Collections hand name and glob strings to a [`Discovery`] implementation.
//! [`FsDiscovery`] resolves them against a root directory and can also walk a
//! whole tree for state files.

use crate::backend::BackendRegistry;
use crate::entity::{state_files_in, Entity, EntityBuilder};
use crate::error::ApiError;
use crate::guard::LockOptions;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Resolves a name or glob pattern to entities
pub trait Discovery: Send + Sync {
    fn resolve(&self, pattern: &str) -> Result<Vec<Entity>, ApiError>;
}

/// Tree walk configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Whether to follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Directory names never descended into
    pub ignore_patterns: Vec<String>,
    /// Maximum depth to traverse (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_patterns: vec![".git".to_string(), "target".to_string(), "node_modules".to_string()],
            max_depth: None,
        }
    }
}

/// Filesystem discovery rooted at one directory
pub struct FsDiscovery {
    root: PathBuf,
    registry: Arc<BackendRegistry>,
    lock: LockOptions,
    config: DiscoveryConfig,
}

impl FsDiscovery {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<BackendRegistry>) -> Self {
        Self {
            root: root.into(),
            registry,
            lock: LockOptions::default(),
            config: DiscoveryConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every entity under the root, sorted by state file path.
    pub fn discover(&self) -> Result<Vec<Entity>, ApiError> {
        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.max_depth.unwrap_or(usize::MAX))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.should_ignore(entry));

        let mut state_files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry during discovery: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file() && self.registry.parse_state_file(entry.path()).is_some() {
                state_files.push(entry.into_path());
            }
        }
        state_files.sort();

        debug!(root = %self.root.display(), found = state_files.len(), "Discovered state files");
        self.open_all(state_files)
    }

    fn open_all(&self, state_files: Vec<PathBuf>) -> Result<Vec<Entity>, ApiError> {
        let mut seen = HashSet::new();
        let mut entities = Vec::with_capacity(state_files.len());
        for path in state_files {
            if !seen.insert(path.clone()) {
                continue;
            }
            let entity = EntityBuilder::new(&path)
                .lock_options(self.lock)
                .open(&self.registry)?;
            entities.push(entity);
        }
        Ok(entities)
    }

    fn should_ignore(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        self.config.ignore_patterns.iter().any(|p| name == p.as_str())
    }
}

impl Discovery for FsDiscovery {
    /// Resolve `pattern` relative to the root.
    ///
    /// A matching state file contributes itself; a matching directory
    /// contributes every state file directly inside it.
    fn resolve(&self, pattern: &str) -> Result<Vec<Entity>, ApiError> {
        let full = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            self.root.join(pattern)
        };
        let full_pattern = full.to_string_lossy().into_owned();

        let paths = glob::glob(&full_pattern).map_err(|e| ApiError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut state_files = Vec::new();
        for path in paths {
            let path = match path {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable match for '{}': {}", pattern, e);
                    continue;
                }
            };
            if path.is_file() {
                if self.registry.parse_state_file(&path).is_some() {
                    state_files.push(path);
                }
            } else if path.is_dir() {
                state_files.extend(state_files_in(&path, &self.registry)?);
            }
        }

        self.open_all(state_files)
    }
}
