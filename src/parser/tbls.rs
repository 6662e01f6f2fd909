//! tbls JSON introspection front-end.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ProcessError, ProcessResult};
use crate::schema::{
    Cardinality, Column, ColumnDefault, Constraint, Enum, Index, ReferenceOption, Relationship,
    Schema, Table,
};

static ON_UPDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ON UPDATE (SET NULL|SET DEFAULT|RESTRICT|CASCADE|NO ACTION)")
        .expect("valid regex")
});
static ON_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ON DELETE (SET NULL|SET DEFAULT|RESTRICT|CASCADE|NO ACTION)")
        .expect("valid regex")
});
static USING: Lazy<Regex> = Lazy::new(|| Regex::new(r"using\s+(\w+)").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct TblsSchema {
    tables: Vec<TblsTable>,
    #[serde(default)]
    relations: Vec<TblsRelation>,
    #[serde(default)]
    enums: Vec<TblsEnum>,
}

#[derive(Debug, Deserialize)]
struct TblsTable {
    name: String,
    columns: Vec<TblsColumn>,
    #[serde(default)]
    indexes: Vec<TblsIndex>,
    #[serde(default)]
    constraints: Vec<TblsConstraint>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TblsColumn {
    name: String,
    #[serde(rename = "type")]
    typ: String,
    nullable: bool,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TblsIndex {
    name: String,
    def: String,
    #[serde(default)]
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TblsConstraint {
    name: String,
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    def: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    referenced_table: Option<String>,
    #[serde(default)]
    referenced_columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TblsRelation {
    table: String,
    columns: Vec<String>,
    parent_table: String,
    parent_columns: Vec<String>,
    #[serde(default)]
    cardinality: Option<String>,
    #[serde(default)]
    def: String,
}

#[derive(Debug, Deserialize)]
struct TblsEnum {
    name: String,
    values: Vec<String>,
}

/// Parse a tbls `schema.json` document. Input that does not match the tbls
/// format yields an empty schema and a single error.
pub fn parse(input: &str) -> ProcessResult {
    let document: TblsSchema = match serde_json::from_str(input) {
        Ok(document) => document,
        Err(error) => {
            warn!(%error, "rejecting tbls input");
            return ProcessResult {
                value: Schema::default(),
                errors: vec![ProcessError::InvalidInput(format!(
                    "Invalid schema format: {error}"
                ))],
            };
        }
    };

    let mut schema = Schema::default();
    for table in document.tables {
        schema.add_table(convert_table(table));
    }
    for relation in document.relations {
        if let Some(relationship) = convert_relation(relation) {
            schema.add_relationship(relationship);
        }
    }
    for block in document.enums {
        // `public.status` -> `status`
        let name = match block.name.rsplit_once('.') {
            Some((_, name)) => name.to_string(),
            None => block.name,
        };
        schema.enums.insert(
            name.clone(),
            Enum {
                name,
                values: block.values,
                comment: None,
            },
        );
    }

    debug!(tables = schema.tables.len(), "converted tbls document");
    ProcessResult {
        value: schema,
        errors: Vec::new(),
    }
}

fn convert_table(source: TblsTable) -> Table {
    let mut table = Table::new(source.name);
    table.comment = source.comment;

    let primary: Vec<&String> = source
        .constraints
        .iter()
        .filter(|c| c.typ == "PRIMARY KEY")
        .flat_map(|c| &c.columns)
        .collect();
    let unique: Vec<&String> = source
        .constraints
        .iter()
        .filter(|c| c.typ == "UNIQUE" && c.columns.len() == 1)
        .flat_map(|c| &c.columns)
        .collect();

    for column in &source.columns {
        let mut converted = Column::new(&column.name, &column.typ);
        converted.not_null = !column.nullable;
        converted.primary = primary.contains(&&column.name);
        converted.unique = unique.contains(&&column.name);
        converted.default = column.default.as_deref().map(default_value);
        converted.comment = column.comment.clone();
        table.columns.insert(converted.name.clone(), converted);
    }

    for index in source.indexes {
        let def = index.def.to_lowercase();
        let typ = USING
            .captures(&def)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        table.indexes.insert(
            index.name.clone(),
            Index {
                name: index.name,
                columns: index.columns,
                unique: def.contains("unique"),
                typ,
            },
        );
    }

    for constraint in source.constraints {
        if let Some(converted) = convert_constraint(constraint) {
            table.add_constraint(converted);
        }
    }

    table
}

fn convert_constraint(source: TblsConstraint) -> Option<Constraint> {
    let TblsConstraint {
        name,
        typ,
        def,
        columns,
        referenced_table,
        referenced_columns,
    } = source;

    match typ.as_str() {
        "PRIMARY KEY" if !columns.is_empty() => Some(Constraint::PrimaryKey {
            name,
            column_names: columns,
        }),
        "UNIQUE" if !columns.is_empty() => Some(Constraint::Unique {
            name,
            column_names: columns,
        }),
        "CHECK" => Some(Constraint::Check { name, detail: def }),
        "FOREIGN KEY" if !columns.is_empty() && !referenced_columns.is_empty() => {
            let (update_constraint, delete_constraint) = foreign_key_actions(&def);
            Some(Constraint::ForeignKey {
                name,
                column_names: columns,
                target_table_name: referenced_table.filter(|t| !t.is_empty())?,
                target_column_names: referenced_columns,
                update_constraint,
                delete_constraint,
            })
        }
        _ => None,
    }
}

fn convert_relation(relation: TblsRelation) -> Option<Relationship> {
    let (Some(parent_column), Some(column)) =
        (relation.parent_columns.first(), relation.columns.first())
    else {
        return None;
    };

    let mut relationship =
        Relationship::new(&relation.parent_table, parent_column, &relation.table, column);
    relationship.cardinality = match relation.cardinality.as_deref() {
        Some("zero_or_one") => Cardinality::OneToOne,
        _ => Cardinality::OneToMany,
    };
    (relationship.update_constraint, relationship.delete_constraint) =
        foreign_key_actions(&relation.def);
    Some(relationship)
}

fn foreign_key_actions(def: &str) -> (ReferenceOption, ReferenceOption) {
    let action = |re: &Regex| {
        re.captures(def)
            .and_then(|c| ReferenceOption::from_sql(&c[1]))
            .unwrap_or_default()
    };
    (action(&ON_UPDATE), action(&ON_DELETE))
}

/// Numbers first, then booleans, otherwise the raw expression.
fn default_value(raw: &str) -> ColumnDefault {
    if let Ok(n) = raw.trim().parse::<i64>() {
        return ColumnDefault::Integer(n);
    }
    if let Ok(f) = raw.trim().parse::<f64>() {
        if f.is_finite() {
            return ColumnDefault::Float(f);
        }
    }
    match raw.to_lowercase().as_str() {
        "true" => ColumnDefault::Boolean(true),
        "false" => ColumnDefault::Boolean(false),
        _ => ColumnDefault::Text(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = r#"{
      "name": "app",
      "tables": [
        {
          "name": "users",
          "type": "BASE TABLE",
          "comment": "accounts",
          "columns": [
            {"name": "id", "type": "bigint", "nullable": false, "default": "nextval('users_id_seq'::regclass)"},
            {"name": "email", "type": "varchar(255)", "nullable": false},
            {"name": "active", "type": "boolean", "nullable": true, "default": "true"},
            {"name": "score", "type": "integer", "nullable": true, "default": "10"}
          ],
          "indexes": [
            {"name": "users_pkey", "def": "CREATE UNIQUE INDEX users_pkey ON public.users USING btree (id)", "columns": ["id"]},
            {"name": "users_email_idx", "def": "CREATE INDEX users_email_idx ON public.users USING gin (email)", "columns": ["email"]}
          ],
          "constraints": [
            {"name": "users_pkey", "type": "PRIMARY KEY", "def": "PRIMARY KEY (id)", "table": "users", "columns": ["id"]},
            {"name": "users_email_key", "type": "UNIQUE", "def": "UNIQUE (email)", "table": "users", "columns": ["email"]}
          ]
        },
        {
          "name": "posts",
          "type": "BASE TABLE",
          "columns": [
            {"name": "id", "type": "bigint", "nullable": false},
            {"name": "user_id", "type": "bigint", "nullable": false}
          ],
          "constraints": [
            {"name": "posts_user_id_fkey", "type": "FOREIGN KEY",
             "def": "FOREIGN KEY (user_id) REFERENCES users(id) ON UPDATE RESTRICT ON DELETE CASCADE",
             "table": "posts", "columns": ["user_id"], "referenced_table": "users", "referenced_columns": ["id"]},
            {"name": "posts_id_check", "type": "CHECK", "def": "CHECK ((id > 0))", "table": "posts", "columns": ["id"]}
          ]
        }
      ],
      "relations": [
        {"table": "posts", "columns": ["user_id"], "parent_table": "users", "parent_columns": ["id"],
         "cardinality": "zero_or_more", "parent_cardinality": "exactly_one",
         "def": "FOREIGN KEY (user_id) REFERENCES users(id) ON UPDATE RESTRICT ON DELETE CASCADE"}
      ],
      "enums": [
        {"name": "public.status", "values": ["active", "inactive"]}
      ]
    }"#;

    #[test]
    fn test_columns_and_defaults() {
        let result = parse(INPUT);
        assert!(result.errors.is_empty());
        let users = &result.value.tables["users"];
        assert_eq!(users.comment.as_deref(), Some("accounts"));
        assert!(users.columns["id"].primary);
        assert!(users.columns["email"].unique);
        assert!(users.columns["email"].not_null);
        assert_eq!(users.columns["active"].default, Some(ColumnDefault::Boolean(true)));
        assert_eq!(users.columns["score"].default, Some(ColumnDefault::Integer(10)));
        assert_eq!(
            users.columns["id"].default,
            Some(ColumnDefault::Text("nextval('users_id_seq'::regclass)".into()))
        );
    }

    #[test]
    fn test_indexes() {
        let users = &parse(INPUT).value.tables["users"];
        assert!(users.indexes["users_pkey"].unique);
        assert_eq!(users.indexes["users_pkey"].typ, "btree");
        assert!(!users.indexes["users_email_idx"].unique);
        assert_eq!(users.indexes["users_email_idx"].typ, "gin");
    }

    #[test]
    fn test_constraints_and_relations() {
        let schema = parse(INPUT).value;
        let posts = &schema.tables["posts"];
        match &posts.constraints["posts_user_id_fkey"] {
            Constraint::ForeignKey {
                update_constraint,
                delete_constraint,
                ..
            } => {
                assert_eq!(*update_constraint, ReferenceOption::Restrict);
                assert_eq!(*delete_constraint, ReferenceOption::Cascade);
            }
            other => panic!("unexpected constraint {other:?}"),
        }
        assert!(matches!(
            &posts.constraints["posts_id_check"],
            Constraint::Check { detail, .. } if detail == "CHECK ((id > 0))"
        ));

        let relationship = &schema.relationships["users_id_to_posts_user_id"];
        assert_eq!(relationship.cardinality, Cardinality::OneToMany);
        assert_eq!(relationship.delete_constraint, ReferenceOption::Cascade);

        assert_eq!(schema.enums["status"].values, vec!["active", "inactive"]);
    }

    #[test]
    fn test_invalid_input() {
        let result = parse(r#"{"name": "app"}"#);
        assert!(result.value.tables.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].name(), "InvalidInputError");
        assert!(result.errors[0].message().starts_with("Invalid schema format"));
    }
}
