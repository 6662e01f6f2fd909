//! Database extension names: normalization, the sandbox support set, and
//! detection of `CREATE EXTENSION` in DDL.
//!
//! SQL spells `uuid-ossp` with a hyphen while the sandbox runtime module is
//! `uuid_ossp`; every other supported extension uses one spelling for both.

use std::collections::HashMap;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{info, warn};

use crate::schema::Schema;

/// Extensions the sandbox runtime can load, in normalized form.
pub static SUPPORTED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "live",
        "vector",
        "amcheck",
        "auto_explain",
        "bloom",
        "btree_gin",
        "btree_gist",
        "citext",
        "cube",
        "earthdistance",
        "fuzzystrmatch",
        "hstore",
        "isn",
        "lo",
        "ltree",
        "pg_ivm",
        "pg_trgm",
        "seg",
        "tablefunc",
        "tcn",
        "tsm_system_rows",
        "tsm_system_time",
        "uuid-ossp",
    ]
    .into_iter()
    .collect()
});

static RUNTIME_NAMES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("uuid-ossp", "uuid_ossp"), ("vector", "vector")]));

static CREATE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)CREATE\s+EXTENSION\s+(?:IF\s+NOT\s+EXISTS\s+)?["']?([^"'\s;]+)["']?"#)
        .expect("valid regex")
});

/// Lowercase, unquote and map `uuid_ossp` to `uuid-ossp`.
pub fn normalize_extension_name(name: &str) -> String {
    let mut normalized = name.trim();
    if normalized.len() >= 2 && normalized.starts_with('"') && normalized.ends_with('"') {
        normalized = &normalized[1..normalized.len() - 1];
    }
    let normalized = normalized.to_lowercase();
    if normalized == "uuid_ossp" {
        "uuid-ossp".to_string()
    } else {
        normalized
    }
}

pub fn is_extension_supported(name: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(normalize_extension_name(name).as_str())
}

/// Module name the sandbox runtime loads an extension under.
pub fn javascript_runtime_name(sql_name: &str) -> String {
    let normalized = normalize_extension_name(sql_name);
    if let Some(mapped) = RUNTIME_NAMES.get(normalized.as_str()) {
        return mapped.to_string();
    }
    if SUPPORTED_EXTENSIONS.contains(normalized.as_str()) {
        return normalized;
    }
    normalized.replace('_', "-")
}

/// Supported extensions named by `CREATE EXTENSION` statements, in order of
/// appearance and without duplicates. Unsupported names are logged and
/// skipped.
pub fn detect_extensions_from_ddl(sql: &str) -> Vec<String> {
    let mut found = Vec::new();
    for captures in CREATE_EXTENSION.captures_iter(sql) {
        let name = normalize_extension_name(&captures[1]);
        if !SUPPORTED_EXTENSIONS.contains(name.as_str()) {
            warn!(extension = %name, "extension not supported in sandbox, skipping");
            continue;
        }
        if !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

/// Comment out `CREATE EXTENSION` statements the sandbox cannot load.
/// Returns the rewritten SQL and the names that were kept.
pub fn filter_extension_ddl(sql: &str) -> (String, Vec<String>) {
    let mut kept = Vec::new();
    let mut excluded = 0usize;

    let filtered = CREATE_EXTENSION.replace_all(sql, |captures: &Captures| {
        let statement = &captures[0];
        let name = normalize_extension_name(&captures[1]);
        if SUPPORTED_EXTENSIONS.contains(name.as_str()) {
            if !kept.contains(&name) {
                kept.push(name);
            }
            statement.to_string()
        } else {
            excluded += 1;
            format!("-- Excluded (not supported in PGlite): {statement}")
        }
    });

    if excluded > 0 {
        info!(kept = kept.len(), excluded, "filtered extension DDL");
    }
    (filtered.into_owned(), kept)
}

/// Extension names a schema requires, in declaration order.
pub fn required_extensions(schema: &Schema) -> Vec<String> {
    schema.extensions.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Extension;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_extension_name("\"UUID-OSSP\""), "uuid-ossp");
        assert_eq!(normalize_extension_name("uuid_ossp"), "uuid-ossp");
        assert_eq!(normalize_extension_name(" pg_trgm "), "pg_trgm");
        assert_eq!(normalize_extension_name("\""), "\"");
    }

    #[test]
    fn test_support_matrix() {
        for name in ["uuid-ossp", "vector", "hstore", "pg_trgm", "\"uuid_ossp\""] {
            assert!(is_extension_supported(name), "{name}");
        }
        for name in ["postgis", "pg_stat_statements", "random_extension"] {
            assert!(!is_extension_supported(name), "{name}");
        }
    }

    #[test]
    fn test_runtime_names() {
        assert_eq!(javascript_runtime_name("uuid-ossp"), "uuid_ossp");
        assert_eq!(javascript_runtime_name("vector"), "vector");
        assert_eq!(javascript_runtime_name("pg_trgm"), "pg_trgm");
        assert_eq!(javascript_runtime_name("my_ext"), "my-ext");
    }

    #[test]
    fn test_detect() {
        assert_eq!(
            detect_extensions_from_ddl("CREATE EXTENSION \"uuid-ossp\";"),
            vec!["uuid-ossp"]
        );
        assert!(detect_extensions_from_ddl("CREATE EXTENSION postgis;").is_empty());

        let sql = "create extension if not exists vector;\nCREATE EXTENSION hstore;\nCREATE EXTENSION vector;";
        assert_eq!(detect_extensions_from_ddl(sql), vec!["vector", "hstore"]);
    }

    #[test]
    fn test_filter() {
        let sql = "CREATE EXTENSION postgis;\nCREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";";
        let (filtered, kept) = filter_extension_ddl(sql);
        assert_eq!(
            filtered,
            "-- Excluded (not supported in PGlite): CREATE EXTENSION postgis;\nCREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";"
        );
        assert_eq!(kept, vec!["uuid-ossp"]);
    }

    #[test]
    fn test_required_extensions() {
        let mut schema = Schema::default();
        for name in ["uuid-ossp", "vector"] {
            schema.extensions.insert(name.into(), Extension { name: name.into() });
        }
        assert_eq!(required_extensions(&schema), vec!["uuid-ossp", "vector"]);
    }
}
