//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::MultipleMatchesFound { .. } => {
            format!("{}\nhint: pass the state file path instead of the directory", e)
        }
        ApiError::LockTimeout { .. } => {
            format!("{}\nhint: raise lock.timeout_ms or retry once the other writer finishes", e)
        }
        _ => e.to_string(),
    }
}
