//! CLI parse: clap types for grove. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// grove - tags and categories for directories
#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Tag, categorize, and query directories through per-directory state files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (discovery root and config lookup)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Output format shared by listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an entity in a directory, or attach to the existing one
    Init {
        /// Entity directory
        path: PathBuf,
        /// Storage backend for a new entity (json, yaml, binary, toml)
        #[arg(long)]
        backend: Option<String>,
        /// Always create a new state file, even if one exists
        #[arg(long)]
        new: bool,
        /// Tags to add
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Categories to set, as key=value
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    /// Tag operations on one entity
    Tags {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Category operations on one entity
    Cats {
        #[command(subcommand)]
        command: CatCommands,
    },
    /// Find entities under the workspace matching a tag query
    Find {
        /// Glob of entity directories relative to the workspace (default: walk everything)
        #[arg(long)]
        pattern: Option<String>,
        /// Entities must carry all of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Entities must carry at least one of these tags
        #[arg(long = "any")]
        any: Vec<String>,
        /// Entities must lack at least one of these tags
        #[arg(long = "not-all")]
        not_all: Vec<String>,
        /// Print tags in the selection fuzzily matching this term instead
        #[arg(long)]
        fuzzy: Option<String>,
        /// Fuzzy threshold (0-100); defaults to the configured one
        #[arg(long)]
        threshold: Option<u8>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Group entities under the workspace by category values
    Groupby {
        /// Category keys, in grouping order
        #[arg(required = true)]
        keys: Vec<String>,
        /// Glob of entity directories relative to the workspace (default: walk everything)
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// Add tags
    Add {
        path: PathBuf,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags (absent tags are ignored)
    Remove {
        path: PathBuf,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// List tags
    List {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Remove every tag
    Clear { path: PathBuf },
}

#[derive(Subcommand)]
pub enum CatCommands {
    /// Set categories, as key=value (`true`/`false`, numbers, or strings)
    Set {
        path: PathBuf,
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Remove categories by key (absent keys are ignored)
    Remove {
        path: PathBuf,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// List categories
    List {
        path: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}
