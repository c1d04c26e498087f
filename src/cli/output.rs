//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Unauthorized(_) => format!("{}\nRun `folio login` first.", e),
        ApiError::UnknownTag(_) => {
            let known: Vec<&str> = crate::types::Tag::ALL.iter().map(|t| t.as_str()).collect();
            format!("{}\nKnown tags: {}", e, known.join(", "))
        }
        _ => e.to_string(),
    }
}
