//! Configuration System
//!
//! Layered configuration for the library defaults and the `grove` binary.
//! Sources merge in order: built-in defaults, the global config file, the
//! workspace `.grove/config.toml`, then `GROVE_*` environment variables.

use crate::backend::BackendRegistry;
use crate::discovery::DiscoveryConfig;
use crate::error::ApiError;
use crate::guard::{LockOptions, DEFAULT_POLL_INTERVAL};
use crate::logging::LoggingConfig;
use crate::tags::DEFAULT_FUZZY_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::{workspace_config_path, WORKSPACE_DIR};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroveConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub lock: LockSettings,

    #[serde(default)]
    pub query: QuerySettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Registry name used when creating new entities
    #[serde(default = "default_backend")]
    pub default: String,
}

fn default_backend() -> String {
    "json".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            default: default_backend(),
        }
    }
}

/// Lock waiting behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockSettings {
    /// Milliseconds before `LockTimeout`; absent waits forever
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Query defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Fuzzy matches must score strictly above this (0..=100)
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u8,
}

fn default_fuzzy_threshold() -> u8 {
    DEFAULT_FUZZY_THRESHOLD
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// Tree walk settings for discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default)]
    pub follow_symlinks: bool,

    /// Directory names never descended into
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_ignore() -> Vec<String> {
    DiscoveryConfig::default().ignore_patterns
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_depth: None,
            follow_symlinks: false,
            ignore: default_ignore(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown default backend '{name}' (known: {known})")]
    UnknownBackend { name: String, known: String },

    #[error("Lock poll interval must be positive")]
    ZeroPollInterval,

    #[error("Fuzzy threshold {0} is above 100")]
    ThresholdOutOfRange(u8),

    #[error("Invalid logging section: {0}")]
    Logging(String),
}

impl GroveConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let registry = BackendRegistry::standard();
        if registry.get(&self.backend.default).is_err() {
            errors.push(ValidationError::UnknownBackend {
                name: self.backend.default.clone(),
                known: registry.names().join(", "),
            });
        }

        if self.lock.poll_interval_ms == 0 {
            errors.push(ValidationError::ZeroPollInterval);
        }

        if self.query.fuzzy_threshold > 100 {
            errors.push(ValidationError::ThresholdOutOfRange(self.query.fuzzy_threshold));
        }

        if let Err(e) = crate::logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e.to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Standard registry with the configured default backend.
    pub fn registry(&self) -> Result<BackendRegistry, ApiError> {
        BackendRegistry::standard().with_default(&self.backend.default)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            timeout: self.lock.timeout_ms.map(Duration::from_millis),
            poll_interval: Duration::from_millis(self.lock.poll_interval_ms.max(1)),
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            follow_symlinks: self.discovery.follow_symlinks,
            ignore_patterns: self.discovery.ignore.clone(),
            max_depth: self.discovery.max_depth,
        }
    }
}

/// Loads [`GroveConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    pub fn load(workspace_root: &Path) -> Result<GroveConfig, ApiError> {
        Self::load_layers(global_config_path().as_deref(), workspace_root)
    }

    /// Load from an explicit global file path instead of the platform one.
    pub fn load_layers(
        global_file: Option<&Path>,
        workspace_root: &Path,
    ) -> Result<GroveConfig, ApiError> {
        // Step 1: defaults
        let builder = merge::merge_policy::builder_with_defaults()?;
        // Step 2: global file
        let builder = sources::global_file::add_to_builder(builder, global_file)?;
        // Step 3: workspace file
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        // Step 4: environment
        let builder = sources::environment::add_to_builder(builder);

        let config: GroveConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Load a single file on top of the defaults, skipping the other layers.
    pub fn load_from_file(path: &Path) -> Result<GroveConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config: GroveConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(PathBuf::from(path)))
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    fn validated(config: GroveConfig) -> Result<GroveConfig, ApiError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
