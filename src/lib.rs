pub mod deparser;
pub mod extensions;
pub mod operation;
pub mod parser;
pub mod report;
pub mod schema;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use deparser::{DeparseError, postgresql_operations_deparser, postgresql_schema_deparser};
use operation::Operation;
use parser::{ErrorReport, Format, ParseOptions};
use schema::Schema;

pub use operation::{apply_patch_operations, get_change_status, ChangeStatus, PathPattern};
pub use parser::{ProcessError, ProcessResult};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct ParseOutput<'a> {
    value: &'a Schema,
    errors: Vec<ErrorReport>,
}

#[derive(Serialize)]
struct DeparseOutput {
    value: String,
    errors: Vec<String>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

/// Parse schema source into `{ value, errors }` JSON.
#[wasm_bindgen(js_name = "parseSchema")]
pub fn parse_schema(
    source: &str,
    format: Option<String>,
    chunk_size: Option<usize>,
) -> Result<String, String> {
    let format = match format.as_deref() {
        Some(name) => Format::from_name(name).ok_or_else(|| format!("unknown format: {name}"))?,
        None => Format::Auto,
    };
    let mut options = ParseOptions::default();
    if let Some(size) = chunk_size {
        options = options.with_chunk_size(size);
    }

    let result = format.parse(source, &options);
    to_json(&ParseOutput {
        value: &result.value,
        errors: result.errors.iter().map(ProcessError::report).collect(),
    })
}

/// Apply a JSON patch to a schema, returning the patched schema JSON.
#[wasm_bindgen(js_name = "applyPatch")]
pub fn apply_patch(schema_json: &str, patch_json: &str) -> Result<String, String> {
    let schema: Schema = serde_json::from_str(schema_json).map_err(|e| e.to_string())?;
    let operations: Vec<Operation> = serde_json::from_str(patch_json).map_err(|e| e.to_string())?;
    let patched = schema.apply(&operations).map_err(|e| e.to_string())?;
    to_json(&patched)
}

/// Render a JSON patch as PostgreSQL DDL.
#[wasm_bindgen(js_name = "deparseOperations")]
pub fn deparse_operations(patch_json: &str) -> Result<String, String> {
    let operations: Vec<Operation> = serde_json::from_str(patch_json).map_err(|e| e.to_string())?;
    let result = postgresql_operations_deparser(&operations);
    to_json(&DeparseOutput {
        value: result.value,
        errors: result.errors.iter().map(DeparseError::to_string).collect(),
    })
}

/// Render a whole schema as PostgreSQL DDL.
#[wasm_bindgen(js_name = "deparseSchema")]
pub fn deparse_schema(schema_json: &str) -> Result<String, String> {
    let schema: Schema = serde_json::from_str(schema_json).map_err(|e| e.to_string())?;
    Ok(postgresql_schema_deparser(&schema).value)
}

/// Supported extensions named by `CREATE EXTENSION` statements.
#[wasm_bindgen(js_name = "detectExtensions")]
pub fn detect_extensions(sql: &str) -> js_sys::Array {
    extensions::detect_extensions_from_ddl(sql)
        .into_iter()
        .map(JsValue::from)
        .collect()
}
