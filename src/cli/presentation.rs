//! CLI presentation: text and json formatters per command family.

mod entity;
mod query;

pub use entity::{format_categories, format_init_summary, format_tags};
pub use query::{format_entity_table, format_fuzzy_matches, format_groups};

use crate::document::Scalar;
use serde_json::Value;

fn scalar_json(value: &Scalar) -> Value {
    match value {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::from(*i),
        Scalar::Float(f) => Value::from(*f),
        Scalar::Str(s) => Value::String(s.clone()),
    }
}

fn pretty(value: &Value) -> String {
    format!("{:#}", value)
}
