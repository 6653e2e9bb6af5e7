//! CLI domain: parse, route, help, output, and presentation only.
//! The route table dispatches to the entity, collection, and discovery layers.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{CatCommands, Cli, Commands, OutputFormat, TagCommands};
pub use route::{parse_entries, RunContext};
