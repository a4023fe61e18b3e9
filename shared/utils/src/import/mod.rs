//! Import/export tooling for admin-managed data.
//!
//! Two formats come through here: workflow-definition JSON (with the
//! compatibility shims the portal accumulated) and the mission/XP status
//! CSV used by the opportunity map.

use thiserror::Error;

use crate::error::RivaError;

pub mod definition;
pub mod missions;

pub use definition::{export_definition, import_definition, DefinitionImport};
pub use missions::{parse_missions_csv, MissionImport, MissionImportRow, MissionStatus};

/// Import failures, classified so callers can show tailored descriptions:
/// malformed input, input that parses but does not match the schema, and
/// input that matches the schema but fails domain validation.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Malformed JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("Definition does not match the expected shape: {0}")]
    Schema(String),
    #[error("Invalid definition: {0}")]
    Validation(String),
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column '{0}'")]
    MissingColumn(String),
}

impl From<ImportError> for RivaError {
    fn from(error: ImportError) -> Self {
        match error {
            ImportError::Validation(message) => RivaError::validation("definition", message),
            other => RivaError::import_format(other.to_string()),
        }
    }
}
