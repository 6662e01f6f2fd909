//! PostgreSQL DDL rendering.
//!
//! Identifiers are always double quoted. Statements that create an object
//! come before the comments that describe it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DeparseError, DeparseResult};
use crate::operation::{Operation, OperationKind, PathPattern};
use crate::parser::postgresql::parser::is_sql_expression;
use crate::schema::{Column, ColumnDefault, Constraint, Enum, Extension, Index, Schema, Table};

/// Introspected check definitions already read `CHECK (...)`.
static CHECK_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*CHECK\s*\(").expect("valid regex"));

/// Render one operation as DDL.
pub fn postgresql_operation_deparser(operation: &Operation) -> DeparseResult {
    match deparse_operation(operation) {
        Ok(ddl) => DeparseResult::ok(ddl),
        Err(error) => {
            warn!(%error, "operation not deparsed");
            DeparseResult::error(error)
        }
    }
}

/// Render a patch. Statements of operations that deparse are joined by blank
/// lines; the rest are reported.
pub fn postgresql_operations_deparser(operations: &[Operation]) -> DeparseResult {
    let mut statements = Vec::new();
    let mut errors = Vec::new();
    for operation in operations {
        let result = postgresql_operation_deparser(operation);
        if !result.value.is_empty() {
            statements.push(result.value);
        }
        errors.extend(result.errors);
    }
    DeparseResult {
        value: statements.join("\n\n"),
        errors,
    }
}

fn deparse_operation(operation: &Operation) -> Result<String, DeparseError> {
    use PathPattern as P;

    let path = operation.path();
    let kind = operation.kind();
    let unsupported = || DeparseError::UnsupportedOperation {
        op: kind_name(kind),
        path: path.to_string(),
    };

    let matched = [
        P::TableBase,
        P::TableName,
        P::TableComment,
        P::ColumnBase,
        P::ColumnName,
        P::ColumnType,
        P::ColumnDefault,
        P::ColumnNotNull,
        P::ColumnComment,
        P::IndexBase,
        P::ConstraintBase,
    ]
    .into_iter()
    .find_map(|pattern| pattern.captures(path).map(|c| (pattern, c)));
    let Some((pattern, (table, item))) = matched else {
        return Err(unsupported());
    };
    let item = item.unwrap_or_default();

    debug!(path, ?pattern, "deparsing operation");

    let ddl = match (pattern, kind) {
        (P::TableBase, OperationKind::Add) => {
            let table: Table = decode(operation, path)?;
            create_table_statement(&table)
        }
        (P::TableBase, OperationKind::Remove) => format!("DROP TABLE {};", quote(&table)),
        (P::TableName, OperationKind::Replace) => {
            let name: String = decode(operation, path)?;
            format!("ALTER TABLE {} RENAME TO {};", quote(&table), quote(&name))
        }
        (P::TableComment, _) => {
            let comment: Option<String> = decode_or_null(operation, path)?;
            format!(
                "COMMENT ON TABLE {} IS {};",
                quote(&table),
                comment_literal(comment.as_deref())
            )
        }
        (P::ColumnBase, OperationKind::Add) => {
            let column: Column = decode(operation, path)?;
            add_column_statement(&table, &column)
        }
        (P::ColumnBase, OperationKind::Remove) => format!(
            "ALTER TABLE {} DROP COLUMN {};",
            quote(&table),
            quote(&item)
        ),
        (P::ColumnName, OperationKind::Replace) => {
            let name: String = decode(operation, path)?;
            format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                quote(&table),
                quote(&item),
                quote(&name)
            )
        }
        (P::ColumnType, OperationKind::Replace) => {
            let typ: String = decode(operation, path)?;
            format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {typ};",
                quote(&table),
                quote(&item)
            )
        }
        (P::ColumnNotNull, OperationKind::Add | OperationKind::Replace) => {
            let not_null: bool = decode(operation, path)?;
            format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                quote(&table),
                quote(&item),
                if not_null { "SET" } else { "DROP" }
            )
        }
        (P::ColumnDefault, _) => {
            let default: Option<ColumnDefault> = decode_or_null(operation, path)?;
            match default {
                Some(default) => format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                    quote(&table),
                    quote(&item),
                    default_literal(&default)
                ),
                None => format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                    quote(&table),
                    quote(&item)
                ),
            }
        }
        (P::ColumnComment, _) => {
            let comment: Option<String> = decode_or_null(operation, path)?;
            format!(
                "COMMENT ON COLUMN {}.{} IS {};",
                quote(&table),
                quote(&item),
                comment_literal(comment.as_deref())
            )
        }
        (P::IndexBase, OperationKind::Add) => {
            let index: Index = decode(operation, path)?;
            create_index_statement(&table, &index)
        }
        (P::IndexBase, OperationKind::Remove) => format!("DROP INDEX {};", quote(&item)),
        (P::ConstraintBase, OperationKind::Add) => {
            let constraint: Constraint = decode(operation, path)?;
            add_constraint_statement(&table, &constraint)
        }
        (P::ConstraintBase, OperationKind::Remove) => format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            quote(&table),
            quote(&item)
        ),
        _ => return Err(unsupported()),
    };
    Ok(ddl)
}

fn kind_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Add => "add",
        OperationKind::Remove => "remove",
        OperationKind::Replace => "replace",
    }
}

fn decode<T: DeserializeOwned>(operation: &Operation, path: &str) -> Result<T, DeparseError> {
    let value = operation.value().cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| DeparseError::InvalidValue {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// `remove` on a nullable field behaves like setting it to null.
fn decode_or_null<T: DeserializeOwned>(
    operation: &Operation,
    path: &str,
) -> Result<Option<T>, DeparseError> {
    match operation.value() {
        None | Some(Value::Null) => Ok(None),
        Some(_) => decode(operation, path).map(Some),
    }
}

/// Render a whole schema: extensions, enums, tables with their comments,
/// indexes, then constraints with foreign keys last so every referenced
/// table already exists.
pub fn postgresql_schema_deparser(schema: &Schema) -> DeparseResult {
    let mut blocks: Vec<String> = Vec::new();

    blocks.extend(schema.extensions.values().map(create_extension_statement));
    blocks.extend(schema.enums.values().map(create_enum_statement));

    for table in schema.tables.values() {
        let columns: Vec<String> = table
            .columns
            .values()
            .map(|column| column_definition(column, false))
            .collect();
        let mut block = create_table_body(&table.name, &columns);
        if let Some(comments) = comment_statements(table) {
            block.push_str("\n\n");
            block.push_str(&comments);
        }
        blocks.push(block);
    }

    for table in schema.tables.values() {
        blocks.extend(
            table
                .indexes
                .values()
                .map(|index| create_index_statement(&table.name, index)),
        );
    }

    for table in schema.tables.values() {
        let flagged = flagged_primary_columns(table);
        if !flagged.is_empty() {
            blocks.push(format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({});",
                quote(&table.name),
                column_list(&flagged)
            ));
        }
    }

    let (foreign_keys, others): (Vec<_>, Vec<_>) = schema
        .tables
        .values()
        .flat_map(|t| t.constraints.values().map(move |c| (t, c)))
        .partition(|(_, c)| matches!(c, Constraint::ForeignKey { .. }));
    for (table, constraint) in others.into_iter().chain(foreign_keys) {
        blocks.push(add_constraint_statement(&table.name, constraint));
    }

    debug!(statements = blocks.len(), "deparsed schema");
    DeparseResult::ok(blocks.join("\n\n"))
}

fn create_extension_statement(extension: &Extension) -> String {
    let plain = extension
        .name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain {
        format!("CREATE EXTENSION IF NOT EXISTS {};", extension.name)
    } else {
        format!("CREATE EXTENSION IF NOT EXISTS {};", quote(&extension.name))
    }
}

fn create_enum_statement(block: &Enum) -> String {
    let values: Vec<String> = block.values.iter().map(|v| string_literal(v)).collect();
    let mut ddl = format!(
        "CREATE TYPE {} AS ENUM ({});",
        quote(&block.name),
        values.join(", ")
    );
    if let Some(comment) = &block.comment {
        ddl.push_str(&format!(
            "\n\nCOMMENT ON TYPE {} IS {};",
            quote(&block.name),
            string_literal(comment)
        ));
    }
    ddl
}

/// `CREATE TABLE` for an `add` table operation. A single column primary
/// key with the default name goes inline; every other constraint becomes a
/// named table constraint. Indexes follow, comments come last.
pub fn create_table_statement(table: &Table) -> String {
    let inline_pk = inline_primary_key(table);
    let mut inlined_checks: Vec<&str> = Vec::new();

    let mut elements: Vec<String> = Vec::new();
    for column in table.columns.values() {
        let primary = inline_pk == Some(column.name.as_str());
        let mut definition = column_definition(column, primary);
        if let Some(detail) = &column.check {
            let constraint = table.constraints.values().find(|c| {
                matches!(c, Constraint::Check { detail: d, .. } if d == detail)
                    && !inlined_checks.contains(&c.name())
            });
            match constraint {
                Some(c) if c.name() != format!("CHECK_{}", column.name) => {
                    definition.push_str(&format!(" CONSTRAINT {}", quote(c.name())));
                    inlined_checks.push(c.name());
                }
                Some(c) => inlined_checks.push(c.name()),
                None => {}
            }
            definition.push_str(&format!(" CHECK ({detail})"));
        }
        elements.push(definition);
    }

    let flagged = flagged_primary_columns(table);
    if inline_pk.is_none() && !flagged.is_empty() {
        elements.push(format!("PRIMARY KEY ({})", column_list(&flagged)));
    }

    for constraint in table.constraints.values() {
        let inlined = match constraint {
            Constraint::PrimaryKey { .. } => inline_pk.is_some(),
            Constraint::Check { name, .. } => inlined_checks.contains(&name.as_str()),
            _ => false,
        };
        if !inlined {
            elements.push(format!(
                "CONSTRAINT {} {}",
                quote(constraint.name()),
                constraint_body(constraint)
            ));
        }
    }

    let mut statements = vec![create_table_body(&table.name, &elements)];
    let indexes: Vec<String> = table
        .indexes
        .values()
        .map(|index| create_index_statement(&table.name, index))
        .collect();
    if !indexes.is_empty() {
        statements.push(indexes.join("\n"));
    }
    statements.extend(comment_statements(table));
    statements.join("\n\n")
}

/// Name of the column whose primary key renders inline, if any.
fn inline_primary_key(table: &Table) -> Option<&str> {
    match table.primary_key() {
        Some(Constraint::PrimaryKey { name, column_names }) => match column_names.as_slice() {
            [column] if *name == format!("PRIMARY_{column}") => Some(column.as_str()),
            _ => None,
        },
        Some(_) => None,
        None => {
            let mut primary = table.columns.values().filter(|c| c.primary);
            match (primary.next(), primary.next()) {
                (Some(column), None) => Some(column.name.as_str()),
                _ => None,
            }
        }
    }
}

/// Columns flagged `primary` on a table without a PRIMARY KEY constraint.
fn flagged_primary_columns(table: &Table) -> Vec<String> {
    if table.primary_key().is_some() {
        return Vec::new();
    }
    table
        .columns
        .values()
        .filter(|c| c.primary)
        .map(|c| c.name.clone())
        .collect()
}

fn create_table_body(name: &str, elements: &[String]) -> String {
    if elements.is_empty() {
        return format!("CREATE TABLE {} ();", quote(name));
    }
    format!(
        "CREATE TABLE {} (\n  {}\n);",
        quote(name),
        elements.join(",\n  ")
    )
}

fn comment_statements(table: &Table) -> Option<String> {
    let mut lines = Vec::new();
    if let Some(comment) = &table.comment {
        lines.push(format!(
            "COMMENT ON TABLE {} IS {};",
            quote(&table.name),
            string_literal(comment)
        ));
    }
    for column in table.columns.values() {
        if let Some(comment) = &column.comment {
            lines.push(format!(
                "COMMENT ON COLUMN {}.{} IS {};",
                quote(&table.name),
                quote(&column.name),
                string_literal(comment)
            ));
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn column_definition(column: &Column, inline_primary: bool) -> String {
    let mut definition = format!("{} {}", quote(&column.name), column.typ);
    if inline_primary {
        definition.push_str(" PRIMARY KEY");
    } else if column.not_null {
        definition.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        definition.push_str(" DEFAULT ");
        definition.push_str(&default_literal(default));
    }
    definition
}

fn add_column_statement(table: &str, column: &Column) -> String {
    let mut ddl = format!(
        "ALTER TABLE {} ADD COLUMN {};",
        quote(table),
        column_definition(column, column.primary)
    );
    if let Some(comment) = &column.comment {
        ddl.push_str(&format!(
            "\n\nCOMMENT ON COLUMN {}.{} IS {};",
            quote(table),
            quote(&column.name),
            string_literal(comment)
        ));
    }
    ddl
}

fn create_index_statement(table: &str, index: &Index) -> String {
    let unique = if index.unique { " UNIQUE" } else { "" };
    let method = if index.typ.is_empty() {
        String::new()
    } else {
        format!(" USING {}", index.typ)
    };
    let columns: Vec<String> = index.columns.iter().map(|c| quote(c)).collect();
    format!(
        "CREATE{unique} INDEX {} ON {}{method} ({});",
        quote(&index.name),
        quote(table),
        columns.join(", ")
    )
}

fn add_constraint_statement(table: &str, constraint: &Constraint) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {};",
        quote(table),
        quote(constraint.name()),
        constraint_body(constraint)
    )
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn constraint_body(constraint: &Constraint) -> String {
    match constraint {
        Constraint::PrimaryKey { column_names, .. } => {
            format!("PRIMARY KEY ({})", column_list(column_names))
        }
        Constraint::Unique { column_names, .. } => {
            format!("UNIQUE ({})", column_list(column_names))
        }
        Constraint::Check { detail, .. } if CHECK_KEYWORD.is_match(detail) => {
            detail.trim_start().to_string()
        }
        Constraint::Check { detail, .. } => format!("CHECK ({detail})"),
        Constraint::ForeignKey {
            column_names,
            target_table_name,
            target_column_names,
            update_constraint,
            delete_constraint,
            ..
        } => format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
            column_list(column_names),
            quote(target_table_name),
            column_list(target_column_names),
            update_constraint.as_sql(),
            delete_constraint.as_sql()
        ),
    }
}

fn default_literal(default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::Boolean(true) => "TRUE".to_string(),
        ColumnDefault::Boolean(false) => "FALSE".to_string(),
        ColumnDefault::Integer(n) => n.to_string(),
        // Debug keeps the fraction so `0.0` reads back as a float.
        ColumnDefault::Float(f) => format!("{f:?}"),
        ColumnDefault::Text(text) if is_sql_expression(text) => text.clone(),
        ColumnDefault::Text(text) => string_literal(text),
    }
}

fn comment_literal(comment: Option<&str>) -> String {
    comment.map_or_else(|| "NULL".to_string(), string_literal)
}

fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReferenceOption;
    use serde_json::json;

    #[test]
    fn test_create_table_with_comments() {
        let op = Operation::add(
            "/tables/users",
            json!({
                "name": "users",
                "columns": {
                    "id": {"name": "id", "type": "bigint", "primary": true, "notNull": true,
                           "default": null, "check": null, "comment": "User ID"},
                    "email": {"name": "email", "type": "varchar(255)", "primary": false, "notNull": true,
                              "default": null, "check": null, "comment": "User email"}
                },
                "comment": "User table",
                "indexes": {},
                "constraints": {}
            }),
        );
        let result = postgresql_operation_deparser(&op);
        assert!(result.errors.is_empty());
        assert_eq!(
            result.value,
            "CREATE TABLE \"users\" (\n  \"id\" bigint PRIMARY KEY,\n  \"email\" varchar(255) NOT NULL\n);\n\n\
             COMMENT ON TABLE \"users\" IS 'User table';\n\
             COMMENT ON COLUMN \"users\".\"id\" IS 'User ID';\n\
             COMMENT ON COLUMN \"users\".\"email\" IS 'User email';"
        );
    }

    #[test]
    fn test_defaults() {
        let op = Operation::add(
            "/tables/settings",
            json!({
                "name": "settings",
                "columns": {
                    "id": {"name": "id", "type": "bigint", "primary": true, "notNull": true},
                    "enabled": {"name": "enabled", "type": "boolean", "notNull": true, "default": true},
                    "title": {"name": "title", "type": "varchar(100)", "default": "Default Title"},
                    "created_at": {"name": "created_at", "type": "timestamp", "default": "now()"},
                    "note": {"name": "note", "type": "text", "default": "it's"}
                }
            }),
        );
        assert_eq!(
            postgresql_operation_deparser(&op).value,
            "CREATE TABLE \"settings\" (\n  \"id\" bigint PRIMARY KEY,\n  \
             \"enabled\" boolean NOT NULL DEFAULT TRUE,\n  \
             \"title\" varchar(100) DEFAULT 'Default Title',\n  \
             \"created_at\" timestamp DEFAULT now(),\n  \
             \"note\" text DEFAULT 'it''s'\n);"
        );
    }

    #[test]
    fn test_drop_table() {
        let result = postgresql_operation_deparser(&Operation::remove("/tables/users"));
        assert!(result.errors.is_empty());
        assert_eq!(result.value, "DROP TABLE \"users\";");
    }

    #[test]
    fn test_column_operations() {
        let add = Operation::add(
            "/tables/users/columns/age",
            json!({"name": "age", "type": "integer", "comment": "User age"}),
        );
        assert_eq!(
            postgresql_operation_deparser(&add).value,
            "ALTER TABLE \"users\" ADD COLUMN \"age\" integer;\n\nCOMMENT ON COLUMN \"users\".\"age\" IS 'User age';"
        );

        let add = Operation::add(
            "/tables/products/columns/price",
            json!({"name": "price", "type": "decimal(10,2)", "notNull": true, "default": 0.0}),
        );
        assert_eq!(
            postgresql_operation_deparser(&add).value,
            "ALTER TABLE \"products\" ADD COLUMN \"price\" decimal(10,2) NOT NULL DEFAULT 0.0;"
        );

        assert_eq!(
            postgresql_operation_deparser(&Operation::remove("/tables/users/columns/age")).value,
            "ALTER TABLE \"users\" DROP COLUMN \"age\";"
        );
    }

    #[test]
    fn test_column_alterations() {
        let cases = [
            (
                Operation::replace("/tables/users/columns/age/type", json!("bigint")),
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" TYPE bigint;",
            ),
            (
                Operation::replace("/tables/users/columns/age/notNull", json!(false)),
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" DROP NOT NULL;",
            ),
            (
                Operation::replace("/tables/users/columns/age/default", json!(18)),
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DEFAULT 18;",
            ),
            (
                Operation::remove("/tables/users/columns/age/default"),
                "ALTER TABLE \"users\" ALTER COLUMN \"age\" DROP DEFAULT;",
            ),
            (
                Operation::replace("/tables/users/columns/age/name", json!("years")),
                "ALTER TABLE \"users\" RENAME COLUMN \"age\" TO \"years\";",
            ),
            (
                Operation::replace("/tables/users/comment", json!(null)),
                "COMMENT ON TABLE \"users\" IS NULL;",
            ),
        ];
        for (op, expected) in cases {
            assert_eq!(postgresql_operation_deparser(&op).value, expected);
        }
    }

    #[test]
    fn test_index_operations() {
        let add = Operation::add(
            "/tables/users/indexes/idx_users_email",
            json!({"name": "idx_users_email", "unique": true, "columns": ["email", "name"], "type": "btree"}),
        );
        assert_eq!(
            postgresql_operation_deparser(&add).value,
            "CREATE UNIQUE INDEX \"idx_users_email\" ON \"users\" USING btree (\"email\", \"name\");"
        );
        let add = Operation::add(
            "/tables/products/indexes/idx_products_category",
            json!({"name": "idx_products_category", "unique": false, "columns": ["category_id"], "type": ""}),
        );
        assert_eq!(
            postgresql_operation_deparser(&add).value,
            "CREATE INDEX \"idx_products_category\" ON \"products\" (\"category_id\");"
        );
        assert_eq!(
            postgresql_operation_deparser(&Operation::remove("/tables/users/indexes/idx_users_email"))
                .value,
            "DROP INDEX \"idx_users_email\";"
        );
    }

    #[test]
    fn test_constraint_operations() {
        let fk = Constraint::ForeignKey {
            name: "fk_orders_user_id".into(),
            column_names: vec!["user_id".into()],
            target_table_name: "users".into(),
            target_column_names: vec!["id".into()],
            update_constraint: ReferenceOption::Cascade,
            delete_constraint: ReferenceOption::SetNull,
        };
        let add = Operation::add(
            "/tables/orders/constraints/fk_orders_user_id",
            serde_json::to_value(&fk).unwrap(),
        );
        assert_eq!(
            postgresql_operation_deparser(&add).value,
            "ALTER TABLE \"orders\" ADD CONSTRAINT \"fk_orders_user_id\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON UPDATE CASCADE ON DELETE SET NULL;"
        );
        assert_eq!(
            postgresql_operation_deparser(&Operation::remove(
                "/tables/orders/constraints/fk_orders_user_id"
            ))
            .value,
            "ALTER TABLE \"orders\" DROP CONSTRAINT \"fk_orders_user_id\";"
        );
    }

    #[test]
    fn test_unsupported_and_invalid() {
        let result = postgresql_operation_deparser(&Operation::replace("/tables/users", json!({})));
        assert!(result.value.is_empty());
        assert!(matches!(
            result.errors[0],
            DeparseError::UnsupportedOperation { op: "replace", .. }
        ));

        let result = postgresql_operation_deparser(&Operation::add("/relationships/x", json!({})));
        assert!(matches!(result.errors[0], DeparseError::UnsupportedOperation { .. }));

        let result = postgresql_operation_deparser(&Operation::add("/tables/users", json!(1)));
        assert!(matches!(result.errors[0], DeparseError::InvalidValue { .. }));
    }

    #[test]
    fn test_composite_key_and_named_check() {
        let mut table = Table::new("memberships")
            .with_column(Column::new("org_id", "bigint").not_null())
            .with_column(Column::new("user_id", "bigint").not_null());
        table.columns["org_id"].primary = true;
        table.columns["user_id"].primary = true;
        table.columns["org_id"].check = Some("org_id > 0".into());
        table.add_constraint(Constraint::PrimaryKey {
            name: "PRIMARY_org_id_user_id".into(),
            column_names: vec!["org_id".into(), "user_id".into()],
        });
        table.add_constraint(Constraint::Check {
            name: "positive_org".into(),
            detail: "org_id > 0".into(),
        });
        assert_eq!(
            create_table_statement(&table),
            "CREATE TABLE \"memberships\" (\n  \
             \"org_id\" bigint NOT NULL CONSTRAINT \"positive_org\" CHECK (org_id > 0),\n  \
             \"user_id\" bigint NOT NULL,\n  \
             CONSTRAINT \"PRIMARY_org_id_user_id\" PRIMARY KEY (\"org_id\", \"user_id\")\n);"
        );
    }

    #[test]
    fn test_schema_deparser_order() {
        let mut schema = Schema::default();
        schema.extensions.insert("uuid-ossp".into(), Extension { name: "uuid-ossp".into() });
        schema.extensions.insert("vector".into(), Extension { name: "vector".into() });
        schema.enums.insert(
            "status".into(),
            Enum {
                name: "status".into(),
                values: vec!["active".into(), "it's".into()],
                comment: Some("State".into()),
            },
        );
        let mut users = Table::new("users")
            .with_column(Column::new("id", "uuid").not_null())
            .with_column(Column::new("created_at", "timestamp").not_null());
        users.columns["id"].default = Some(ColumnDefault::Text("uuid_generate_v4()".into()));
        users.columns["created_at"].default =
            Some(ColumnDefault::Text("CURRENT_TIMESTAMP".into()));
        users.comment = Some("Users".into());
        users.add_constraint(Constraint::PrimaryKey {
            name: "users_pkey".into(),
            column_names: vec!["id".into()],
        });
        let mut posts = Table::new("posts").with_column(Column::new("user_id", "uuid"));
        posts.add_constraint(Constraint::ForeignKey {
            name: "posts_user_fk".into(),
            column_names: vec!["user_id".into()],
            target_table_name: "users".into(),
            target_column_names: vec!["id".into()],
            update_constraint: ReferenceOption::NoAction,
            delete_constraint: ReferenceOption::Cascade,
        });
        posts.add_constraint(Constraint::Check {
            name: "posts_check".into(),
            detail: "CHECK ((user_id IS NOT NULL))".into(),
        });
        posts.indexes.insert(
            "posts_user_idx".into(),
            Index {
                name: "posts_user_idx".into(),
                columns: vec!["user_id".into()],
                unique: false,
                typ: String::new(),
            },
        );
        schema.add_table(posts);
        schema.add_table(users);

        let result = postgresql_schema_deparser(&schema);
        assert!(result.errors.is_empty());
        assert_eq!(
            result.value,
            "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";\n\n\
             CREATE EXTENSION IF NOT EXISTS vector;\n\n\
             CREATE TYPE \"status\" AS ENUM ('active', 'it''s');\n\n\
             COMMENT ON TYPE \"status\" IS 'State';\n\n\
             CREATE TABLE \"posts\" (\n  \"user_id\" uuid\n);\n\n\
             CREATE TABLE \"users\" (\n  \"id\" uuid NOT NULL DEFAULT uuid_generate_v4(),\n  \
             \"created_at\" timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP\n);\n\n\
             COMMENT ON TABLE \"users\" IS 'Users';\n\n\
             CREATE INDEX \"posts_user_idx\" ON \"posts\" (\"user_id\");\n\n\
             ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_check\" CHECK ((user_id IS NOT NULL));\n\n\
             ALTER TABLE \"users\" ADD CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\");\n\n\
             ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_user_fk\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON UPDATE NO ACTION ON DELETE CASCADE;"
        );
    }

    #[test]
    fn test_check_keyword_must_open_the_detail() {
        let op = |detail: &str| {
            Operation::add(
                "/tables/t/constraints/c",
                json!({"type": "CHECK", "name": "c", "detail": detail}),
            )
        };
        assert_eq!(
            postgresql_operation_deparser(&op("checked_at IS NOT NULL")).value,
            "ALTER TABLE \"t\" ADD CONSTRAINT \"c\" CHECK (checked_at IS NOT NULL);"
        );
        assert_eq!(
            postgresql_operation_deparser(&op("check (qty > 0)")).value,
            "ALTER TABLE \"t\" ADD CONSTRAINT \"c\" check (qty > 0);"
        );
    }

    #[test]
    fn test_primary_key_from_column_flags() {
        let op = Operation::add(
            "/tables/m",
            json!({
                "name": "m",
                "columns": {
                    "a": {"name": "a", "type": "int", "primary": true, "notNull": true},
                    "b": {"name": "b", "type": "int", "primary": true, "notNull": true}
                }
            }),
        );
        assert_eq!(
            postgresql_operation_deparser(&op).value,
            "CREATE TABLE \"m\" (\n  \"a\" int NOT NULL,\n  \"b\" int NOT NULL,\n  \
             PRIMARY KEY (\"a\", \"b\")\n);"
        );

        let mut schema = Schema::default();
        schema.add_table(
            Table::new("m")
                .with_column(Column::new("a", "int").primary())
                .with_column(Column::new("b", "int").primary()),
        );
        let ddl = postgresql_schema_deparser(&schema).value;
        assert!(
            ddl.ends_with("ALTER TABLE \"m\" ADD PRIMARY KEY (\"a\", \"b\");"),
            "{ddl}"
        );
    }

    #[test]
    fn test_empty_schema() {
        assert_eq!(postgresql_schema_deparser(&Schema::default()).value, "");
    }
}
