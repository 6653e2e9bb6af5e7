//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources override earlier ones key by key. Tables merge; scalars and
//! arrays replace.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("backend.default", "json")?
        .set_default("lock.poll_interval_ms", 10)?
        .set_default("query.fuzzy_threshold", 80)?
        .set_default("discovery.follow_symlinks", false)?
        .set_default("discovery.ignore", vec![".git", "target", "node_modules"])
}
