//! Render canonical schema operations back into DDL.

pub mod postgresql;

use thiserror::Error;

pub use postgresql::{postgresql_operation_deparser, postgresql_operations_deparser, postgresql_schema_deparser};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeparseError {
    #[error("unsupported operation: {op} {path}")]
    UnsupportedOperation { op: &'static str, path: String },
    #[error("invalid value at {path}: {message}")]
    InvalidValue { path: String, message: String },
}

/// Rendered DDL plus everything that could not be rendered. `value` is
/// empty when nothing could be rendered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeparseResult {
    pub value: String,
    pub errors: Vec<DeparseError>,
}

impl DeparseResult {
    pub fn ok(value: String) -> Self {
        Self {
            value,
            errors: Vec::new(),
        }
    }

    pub fn error(error: DeparseError) -> Self {
        Self {
            value: String::new(),
            errors: vec![error],
        }
    }
}
