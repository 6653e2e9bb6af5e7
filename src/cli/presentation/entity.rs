//! Single-entity output: init summary, tag and category listings.

use super::{pretty, scalar_json};
use crate::cli::parse::OutputFormat;
use crate::document::{CategoryMap, Document};
use crate::entity::Entity;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::{json, Map};

pub fn format_init_summary(entity: &Entity, document: &Document) -> String {
    let mut out = format!(
        "{}\n  uuid:    {}\n  state:   {}\n  backend: {}\n",
        entity,
        entity.uuid(),
        entity.state_path().display(),
        entity.backend_name(),
    );
    if entity.is_read_only() {
        out.push_str("  access:  read-only\n");
    }
    out.push_str(&format!(
        "  tags: {}, categories: {}",
        document.tags.len(),
        document.categories.len()
    ));
    out
}

pub fn format_tags(tags: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => pretty(&json!(tags)),
        OutputFormat::Text => tags.join("\n"),
    }
}

pub fn format_categories(categories: &CategoryMap, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let map: Map<String, serde_json::Value> = categories
                .iter()
                .map(|(k, v)| (k.clone(), scalar_json(v)))
                .collect();
            pretty(&serde_json::Value::Object(map))
        }
        OutputFormat::Text => {
            if categories.is_empty() {
                return String::new();
            }
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Key", "Value", "Type"]);
            for (key, value) in categories {
                table.add_row(vec![key.clone(), value.to_string(), value.type_name().to_string()]);
            }
            table.to_string()
        }
    }
}
