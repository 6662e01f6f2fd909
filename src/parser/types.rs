//! Dialect type names to the canonical type vocabulary.

/// Normalize a PostgreSQL type name. Aliases map to their canonical
/// spelling, modifiers and array suffixes are kept, unknown types pass
/// through unchanged.
pub fn normalize_postgres_type(raw: &str) -> String {
    let raw = raw.trim();

    if let Some(inner) = raw.strip_suffix("[]") {
        return format!("{}[]", normalize_postgres_type(inner));
    }

    let (base, modifier) = match raw.find('(') {
        Some(open) => {
            let close = raw.rfind(')').filter(|&c| c > open).unwrap_or(raw.len());
            let args: String = raw[open..close]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let rest = raw.get(close + 1..).unwrap_or("").trim();
            (format!("{} {}", raw[..open].trim(), rest), Some(format!("{args})")))
        }
        None => (raw.to_string(), None),
    };
    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");

    let canonical = match base.to_lowercase().as_str() {
        "int" | "int4" | "integer" => "integer".to_string(),
        "int8" | "bigint" => "bigint".to_string(),
        "int2" | "smallint" => "smallint".to_string(),
        "serial4" | "serial" => "serial".to_string(),
        "serial8" | "bigserial" => "bigserial".to_string(),
        "serial2" | "smallserial" => "smallserial".to_string(),
        "float4" | "real" => "real".to_string(),
        "float8" | "double precision" => "double precision".to_string(),
        "decimal" | "numeric" => "numeric".to_string(),
        "bool" | "boolean" => "boolean".to_string(),
        "character varying" | "varchar" => "varchar".to_string(),
        "character" | "char" | "bpchar" => "char".to_string(),
        "timestamp without time zone" | "timestamp" => "timestamp".to_string(),
        "timestamp with time zone" | "timestamptz" => "timestamptz".to_string(),
        "time without time zone" | "time" => "time".to_string(),
        "time with time zone" | "timetz" => "timetz".to_string(),
        "bit varying" | "varbit" => "bit varying".to_string(),
        // Custom types keep their spelling; quoted names are case sensitive.
        _ => base,
    };

    match modifier {
        // `timestamp(6) with time zone` keeps its precision on the base
        Some(m) => format!("{canonical}{m}"),
        None => canonical,
    }
}

/// Map a Rails column type to the canonical vocabulary.
pub fn normalize_schemarb_type(raw: &str) -> String {
    match raw {
        "string" => "varchar".to_string(),
        "datetime" => "timestamp".to_string(),
        "binary" => "bytea".to_string(),
        "bit_varying" => "bit varying".to_string(),
        other => other.to_string(),
    }
}

/// Map a Prisma scalar type to the canonical vocabulary. `None` for types
/// that are not scalars (models, enums).
pub fn normalize_prisma_type(raw: &str) -> Option<&'static str> {
    let typ = match raw {
        "String" => "text",
        "Int" => "integer",
        "BigInt" => "bigint",
        "Float" => "double precision",
        "Decimal" => "numeric(65,30)",
        "Boolean" => "boolean",
        "DateTime" => "timestamp(3)",
        "Json" => "jsonb",
        "Bytes" => "bytea",
        _ => return None,
    };
    Some(typ)
}

/// Map a Prisma native type attribute (`@db.VarChar(255)`) to a type name.
pub fn normalize_prisma_native_type(name: &str, args: &[String]) -> String {
    let base = match name {
        "VarChar" => "varchar",
        "Char" => "char",
        "Text" => "text",
        "Uuid" => "uuid",
        "Integer" => "integer",
        "SmallInt" => "smallint",
        "BigInt" => "bigint",
        "Real" => "real",
        "DoublePrecision" => "double precision",
        "Decimal" => "numeric",
        "Boolean" => "boolean",
        "Timestamp" => "timestamp",
        "Timestamptz" => "timestamptz",
        "Date" => "date",
        "Time" => "time",
        "Timetz" => "timetz",
        "Json" => "json",
        "JsonB" => "jsonb",
        "ByteA" => "bytea",
        "Inet" => "inet",
        "Citext" => "citext",
        "Xml" => "xml",
        other => return normalize_postgres_type(other),
    };
    if args.is_empty() {
        base.to_string()
    } else {
        format!("{base}({})", args.join(","))
    }
}
