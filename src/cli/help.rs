//! CLI command names for logging and routing.

use crate::cli::parse::{CatCommands, Commands, TagCommands};

/// Command name string (e.g. "tags.add", "find").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Init { .. } => "init".to_string(),
        Commands::Tags { command } => format!("tags.{}", tag_command_name(command)),
        Commands::Cats { command } => format!("cats.{}", cat_command_name(command)),
        Commands::Find { .. } => "find".to_string(),
        Commands::Groupby { .. } => "groupby".to_string(),
    }
}

pub fn tag_command_name(command: &TagCommands) -> &'static str {
    match command {
        TagCommands::Add { .. } => "add",
        TagCommands::Remove { .. } => "remove",
        TagCommands::List { .. } => "list",
        TagCommands::Clear { .. } => "clear",
    }
}

pub fn cat_command_name(command: &CatCommands) -> &'static str {
    match command {
        CatCommands::Set { .. } => "set",
        CatCommands::Remove { .. } => "remove",
        CatCommands::List { .. } => "list",
    }
}
