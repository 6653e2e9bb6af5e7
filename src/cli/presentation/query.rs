//! Multi-entity output: find results, fuzzy matches, groups.

use super::{pretty, scalar_json};
use crate::aggregate::Groups;
use crate::cli::parse::OutputFormat;
use crate::entity::Entity;
use comfy_table::Table;
use serde_json::json;

/// One row per entity with its tags.
pub fn format_entity_table(rows: &[(Entity, Vec<String>)], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let arr: Vec<serde_json::Value> = rows
                .iter()
                .map(|(entity, tags)| {
                    json!({
                        "name": entity.name(),
                        "uuid": entity.uuid().to_string(),
                        "path": entity.path().display().to_string(),
                        "tags": tags,
                    })
                })
                .collect();
            pretty(&serde_json::Value::Array(arr))
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                return "No matching entities".to_string();
            }
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Name", "Path", "Tags"]);
            for (entity, tags) in rows {
                table.add_row(vec![
                    entity.name(),
                    entity.path().display().to_string(),
                    tags.join(", "),
                ]);
            }
            table.to_string()
        }
    }
}

pub fn format_fuzzy_matches(matches: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => pretty(&json!(matches)),
        OutputFormat::Text if matches.is_empty() => "No matching tags".to_string(),
        OutputFormat::Text => matches.join("\n"),
    }
}

pub fn format_groups(groups: &Groups, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let arr: Vec<serde_json::Value> = groups
                .iter()
                .map(|(values, members)| {
                    json!({
                        "values": values.iter().map(scalar_json).collect::<Vec<_>>(),
                        "members": members.names(),
                    })
                })
                .collect();
            pretty(&json!({ "keys": groups.keys(), "groups": arr }))
        }
        OutputFormat::Text => {
            if groups.is_empty() {
                return "No groups".to_string();
            }
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            let mut header: Vec<String> = groups.keys().to_vec();
            header.push("Members".to_string());
            table.set_header(header);
            for (values, members) in groups.iter() {
                let mut row: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                row.push(members.names().join(", "));
                table.add_row(row);
            }
            table.to_string()
        }
    }
}
