//! Dialect front-ends producing the canonical schema.

pub mod chunks;
pub mod postgresql;
pub mod prisma;
pub mod schemarb;
pub mod tbls;
pub mod types;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::schema::{Constraint, Schema};

/// Default number of lines handed to the chunked SQL parser at once.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Parse-time problem. Accumulated next to a best-effort schema rather than
/// returned as a failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    #[error("{message}")]
    UnexpectedTokenWarning {
        message: String,
        offset: Option<usize>,
    },
    #[error("{message}")]
    Unsupported {
        message: String,
        offset: Option<usize>,
    },
    #[error("{0}")]
    DanglingReference(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("unexpected condition: {0}")]
    UnexpectedCondition(String),
    #[error("statement starting at line {line} does not fit in the chunk window")]
    ChunkWindowExhausted { line: usize },
}

impl ProcessError {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnexpectedTokenWarning { .. } => "UnexpectedTokenWarningError",
            Self::Unsupported { .. } => "UnsupportedTokenError",
            Self::DanglingReference(_) => "DanglingReferenceError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::UnexpectedCondition(_) => "UnexpectedConditionError",
            Self::ChunkWindowExhausted { .. } => "ChunkWindowExhaustedError",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Byte offset into the source text, when known.
    pub fn location(&self) -> Option<usize> {
        match self {
            Self::UnexpectedTokenWarning { offset, .. } | Self::Unsupported { offset, .. } => {
                *offset
            }
            _ => None,
        }
    }

    /// Fatal errors abort the parse; everything else is a warning.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedCondition(_) | Self::ChunkWindowExhausted { .. }
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            name: self.name(),
            message: self.message(),
            location: self.location(),
        }
    }
}

/// JSON view of a [`ProcessError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub name: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<usize>,
}

/// A best-effort schema plus everything that went wrong producing it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessResult {
    pub value: Schema,
    pub errors: Vec<ProcessError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub chunk_size: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ParseOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Source dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Detect from content
    #[default]
    Auto,
    Postgres,
    SchemaRb,
    Prisma,
    Tbls,
}

impl Format {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "postgres" | "postgresql" | "sql" => Some(Self::Postgres),
            "schemarb" | "schema.rb" | "ruby" => Some(Self::SchemaRb),
            "prisma" => Some(Self::Prisma),
            "tbls" | "json" => Some(Self::Tbls),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Postgres => "postgres",
            Self::SchemaRb => "schemarb",
            Self::Prisma => "prisma",
            Self::Tbls => "tbls",
        }
    }

    /// Guess the dialect from content.
    pub fn detect(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') {
            return Self::Tbls;
        }
        if content.contains("ActiveRecord::Schema") || content.contains("create_table ") {
            return Self::SchemaRb;
        }
        let has_block = |keyword: &str| {
            content
                .lines()
                .any(|line| line.trim_start().starts_with(keyword) && line.trim_end().ends_with('{'))
        };
        if has_block("model ") || has_block("datasource ") || has_block("generator ") {
            return Self::Prisma;
        }
        Self::Postgres
    }

    /// Resolve Auto to a concrete dialect.
    pub fn resolve(self, content: &str) -> Self {
        match self {
            Self::Auto => Self::detect(content),
            other => other,
        }
    }

    /// Parse `input` with this dialect's front-end.
    pub fn parse(self, input: &str, options: &ParseOptions) -> ProcessResult {
        let mut result = match self.resolve(input) {
            Self::Postgres | Self::Auto => postgresql::parse(input, options.chunk_size),
            Self::SchemaRb => schemarb::parse(input),
            Self::Prisma => prisma::parse(input),
            Self::Tbls => tbls::parse(input),
        };
        let dangling = validate_references(&result.value);
        result.errors.extend(dangling);
        result
    }
}

/// Flag relationships and foreign keys that point at tables or columns the
/// schema does not contain. Nothing is removed.
pub fn validate_references(schema: &Schema) -> Vec<ProcessError> {
    let mut errors = Vec::new();
    let has_column = |table: &str, column: &str| {
        schema
            .tables
            .get(table)
            .is_some_and(|t| t.columns.contains_key(column))
    };

    for table in schema.tables.values() {
        for constraint in table.constraints.values() {
            let Constraint::ForeignKey {
                name,
                target_table_name,
                target_column_names,
                ..
            } = constraint
            else {
                continue;
            };
            if !schema.tables.contains_key(target_table_name) {
                errors.push(ProcessError::DanglingReference(format!(
                    "foreign key \"{name}\" on \"{}\" references missing table \"{target_table_name}\"",
                    table.name
                )));
            } else if let Some(column) = target_column_names
                .iter()
                .find(|c| !has_column(target_table_name, c))
            {
                errors.push(ProcessError::DanglingReference(format!(
                    "foreign key \"{name}\" on \"{}\" references missing column \"{target_table_name}\".\"{column}\"",
                    table.name
                )));
            }
        }
    }

    for rel in schema.relationships.values() {
        for table in [&rel.primary_table_name, &rel.foreign_table_name] {
            if !schema.tables.contains_key(table) {
                errors.push(ProcessError::DanglingReference(format!(
                    "relationship \"{}\" references missing table \"{table}\"",
                    rel.name
                )));
            }
        }
    }

    for error in &errors {
        warn!(%error, "dangling reference");
    }
    errors
}
