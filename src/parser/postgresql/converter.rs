//! Lowering of parsed statements into schema fragments.
//!
//! [`lower`] is a pure function from one statement to the fragments it
//! contributes. Fragments are folded into a [`ConvertState`] in statement
//! order, which is where cross-statement lookups (primary keys of referenced
//! tables, existence of the target table) happen.

use tracing::{debug, warn};

use super::parser::{
    AlterCommand, ColumnConstraint, ColumnDef, CommentOn, CreateIndex, CreateTable,
    ForeignKeyRef, Statement, TableConstraint, TableConstraintKind, TableElement,
};
use crate::extensions::normalize_extension_name;
use crate::parser::ProcessError;
use crate::parser::types::normalize_postgres_type;
use crate::schema::{
    Column, Constraint, Enum, Extension, Index, Relationship, Schema, Table,
    relationship_name,
};

/// A foreign key whose target columns may still need resolving against the
/// referenced table.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct PendingForeignKey {
    name: Option<String>,
    columns: Vec<String>,
    reference: ForeignKeyRef,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Fragment {
    Table {
        table: Table,
        foreign_keys: Vec<PendingForeignKey>,
    },
    Column {
        table: String,
        column: Column,
        constraints: Vec<Constraint>,
        foreign_keys: Vec<PendingForeignKey>,
    },
    Constraint {
        table: String,
        constraint: Constraint,
    },
    ForeignKey {
        table: String,
        foreign_key: PendingForeignKey,
    },
    Index {
        table: String,
        index: Index,
    },
    TableComment {
        table: String,
        comment: Option<String>,
    },
    ColumnComment {
        table: String,
        column: String,
        comment: Option<String>,
    },
    Enum(Enum),
    Extension(Extension),
    Warning(ProcessError),
}

pub(super) fn lower(statement: Statement) -> Vec<Fragment> {
    match statement {
        Statement::CreateTable(create) => vec![lower_create_table(create)],
        Statement::CreateIndex(create) => vec![lower_create_index(create)],
        Statement::CreateEnum { name, values } => vec![Fragment::Enum(Enum {
            name,
            values,
            comment: None,
        })],
        Statement::CreateExtension { name } => vec![Fragment::Extension(Extension {
            name: normalize_extension_name(&name),
        })],
        Statement::Comment(CommentOn::Table { table, comment }) => {
            vec![Fragment::TableComment { table, comment }]
        }
        Statement::Comment(CommentOn::Column {
            table,
            column,
            comment,
        }) => vec![Fragment::ColumnComment {
            table,
            column,
            comment,
        }],
        Statement::AlterTable(alter) => {
            let table = alter.table;
            alter
                .commands
                .into_iter()
                .filter_map(|command| match command {
                    AlterCommand::AddConstraint(constraint) => {
                        Some(lower_table_constraint(&table, constraint))
                    }
                    AlterCommand::AddColumn(def) => Some(lower_added_column(&table, def)),
                    AlterCommand::Other => None,
                })
                .collect()
        }
        Statement::Other => Vec::new(),
    }
}

struct LoweredColumn {
    column: Column,
    constraints: Vec<Constraint>,
    foreign_keys: Vec<PendingForeignKey>,
}

fn lower_column(table: &str, def: ColumnDef) -> LoweredColumn {
    let mut column = Column::new(def.name, normalize_postgres_type(&def.type_name));
    let mut constraints = Vec::new();
    let mut foreign_keys = Vec::new();

    for constraint in def.constraints {
        match constraint {
            ColumnConstraint::PrimaryKey { name } => {
                column = column.primary();
                constraints.push(Constraint::PrimaryKey {
                    name: name.unwrap_or_else(|| default_name("PRIMARY", &[&column.name])),
                    column_names: vec![column.name.clone()],
                });
            }
            ColumnConstraint::NotNull => column.not_null = true,
            ColumnConstraint::Null | ColumnConstraint::Ignored => {}
            ColumnConstraint::Unique { name } => {
                column.unique = true;
                constraints.push(Constraint::Unique {
                    name: name.unwrap_or_else(|| default_name("UNIQUE", &[&column.name])),
                    column_names: vec![column.name.clone()],
                });
            }
            ColumnConstraint::Default(value) => column.default = value,
            ColumnConstraint::Check { name, detail } => {
                column.check = Some(detail.clone());
                constraints.push(Constraint::Check {
                    name: name.unwrap_or_else(|| default_name("CHECK", &[&column.name])),
                    detail,
                });
            }
            ColumnConstraint::References { name, reference } => {
                foreign_keys.push(PendingForeignKey {
                    name,
                    columns: vec![column.name.clone()],
                    reference,
                });
            }
        }
    }

    debug!(table, column = %column.name, typ = %column.typ, "lowered column");
    LoweredColumn {
        column,
        constraints,
        foreign_keys,
    }
}

fn lower_create_table(create: CreateTable) -> Fragment {
    let mut table = Table::new(create.name);
    let mut foreign_keys = Vec::new();
    let mut constraints = Vec::new();

    for element in create.elements {
        match element {
            TableElement::Column(def) => {
                let lowered = lower_column(&table.name, def);
                table
                    .columns
                    .insert(lowered.column.name.clone(), lowered.column);
                constraints.extend(lowered.constraints);
                foreign_keys.extend(lowered.foreign_keys);
            }
            TableElement::Constraint(constraint) => {
                match lower_table_constraint(&table.name, constraint) {
                    Fragment::ForeignKey { foreign_key, .. } => foreign_keys.push(foreign_key),
                    Fragment::Constraint { constraint, .. } => constraints.push(constraint),
                    _ => {}
                }
            }
        }
    }

    for constraint in constraints {
        mark_columns(&mut table, &constraint);
        table.add_constraint(constraint);
    }

    Fragment::Table {
        table,
        foreign_keys,
    }
}

/// Returns either a [`Fragment::Constraint`] or a [`Fragment::ForeignKey`].
fn lower_table_constraint(table: &str, constraint: TableConstraint) -> Fragment {
    let TableConstraint { name, kind } = constraint;
    let constraint = match kind {
        TableConstraintKind::PrimaryKey(columns) => Constraint::PrimaryKey {
            name: name.unwrap_or_else(|| default_name("PRIMARY", &columns)),
            column_names: columns,
        },
        TableConstraintKind::Unique(columns) => Constraint::Unique {
            name: name.unwrap_or_else(|| default_name("UNIQUE", &columns)),
            column_names: columns,
        },
        TableConstraintKind::Check(detail) => Constraint::Check {
            name: name.unwrap_or_else(|| default_name("CHECK", &[table])),
            detail,
        },
        TableConstraintKind::ForeignKey { columns, reference } => {
            return Fragment::ForeignKey {
                table: table.to_string(),
                foreign_key: PendingForeignKey {
                    name,
                    columns,
                    reference,
                },
            };
        }
    };
    Fragment::Constraint {
        table: table.to_string(),
        constraint,
    }
}

fn lower_added_column(table: &str, def: ColumnDef) -> Fragment {
    let lowered = lower_column(table, def);
    Fragment::Column {
        table: table.to_string(),
        column: lowered.column,
        constraints: lowered.constraints,
        foreign_keys: lowered.foreign_keys,
    }
}

fn lower_create_index(create: CreateIndex) -> Fragment {
    let name = create.name.unwrap_or_else(|| {
        if create.columns.is_empty() {
            format!("{}_idx", create.table)
        } else {
            format!("{}_{}_idx", create.table, create.columns.join("_"))
        }
    });
    Fragment::Index {
        table: create.table,
        index: Index {
            name,
            columns: create.columns,
            unique: create.unique,
            typ: create.method.unwrap_or_default(),
        },
    }
}

/// `PRIMARY_id`, `UNIQUE_tenant_id_email`, `CHECK_price`.
fn default_name<S: AsRef<str>>(prefix: &str, parts: &[S]) -> String {
    let joined: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
    format!("{prefix}_{}", joined.join("_"))
}

/// Reflect a key constraint on the flags of the columns it covers.
fn mark_columns(table: &mut Table, constraint: &Constraint) {
    match constraint {
        Constraint::PrimaryKey { column_names, .. } => {
            let single = column_names.len() == 1;
            for name in column_names {
                if let Some(column) = table.columns.get_mut(name) {
                    column.primary = true;
                    column.not_null = true;
                    column.unique |= single;
                }
            }
        }
        Constraint::Unique { column_names, .. } if column_names.len() == 1 => {
            if let Some(column) = table.columns.get_mut(&column_names[0]) {
                column.unique = true;
            }
        }
        _ => {}
    }
}

/// Schema under construction plus the warnings raised building it.
#[derive(Debug, Default)]
pub(super) struct ConvertState {
    pub schema: Schema,
    pub errors: Vec<ProcessError>,
}

impl ConvertState {
    pub fn absorb(mut self, fragment: Fragment) -> Self {
        match fragment {
            Fragment::Table {
                table,
                foreign_keys,
            } => {
                let name = table.name.clone();
                self.schema.add_table(table);
                for foreign_key in foreign_keys {
                    self.absorb_foreign_key(&name, foreign_key);
                }
            }
            Fragment::Column {
                table,
                column,
                constraints,
                foreign_keys,
            } => {
                let Some(target) = self.table_mut(&table, "column") else {
                    return self;
                };
                target.columns.insert(column.name.clone(), column);
                for constraint in constraints {
                    target.add_constraint(constraint);
                }
                for foreign_key in foreign_keys {
                    self.absorb_foreign_key(&table, foreign_key);
                }
            }
            Fragment::Constraint { table, constraint } => {
                if let Some(target) = self.table_mut(&table, "constraint") {
                    mark_columns(target, &constraint);
                    target.add_constraint(constraint);
                }
            }
            Fragment::ForeignKey { table, foreign_key } => {
                self.absorb_foreign_key(&table, foreign_key);
            }
            Fragment::Index { table, index } => {
                if let Some(target) = self.table_mut(&table, "index") {
                    target.indexes.insert(index.name.clone(), index);
                }
            }
            Fragment::TableComment { table, comment } => {
                if let Some(target) = self.table_mut(&table, "comment") {
                    target.comment = comment;
                }
            }
            Fragment::ColumnComment {
                table,
                column,
                comment,
            } => {
                let found = self
                    .schema
                    .tables
                    .get_mut(&table)
                    .and_then(|t| t.columns.get_mut(&column));
                match found {
                    Some(target) => target.comment = comment,
                    None => self.dangling(format!(
                        "comment targets missing column \"{table}\".\"{column}\""
                    )),
                }
            }
            Fragment::Enum(definition) => {
                self.schema.enums.insert(definition.name.clone(), definition);
            }
            Fragment::Extension(extension) => {
                self.schema
                    .extensions
                    .insert(extension.name.clone(), extension);
            }
            Fragment::Warning(error) => self.errors.push(error),
        }
        self
    }

    fn table_mut(&mut self, table: &str, what: &str) -> Option<&mut Table> {
        if !self.schema.tables.contains_key(table) {
            self.dangling(format!("{what} targets missing table \"{table}\""));
        }
        self.schema.tables.get_mut(table)
    }

    fn dangling(&mut self, message: String) {
        warn!(%message, "skipping statement");
        self.errors.push(ProcessError::DanglingReference(message));
    }

    fn absorb_foreign_key(&mut self, table: &str, foreign_key: PendingForeignKey) {
        let PendingForeignKey {
            name,
            columns,
            reference,
        } = foreign_key;

        // `REFERENCES users` without a column list targets the primary key.
        let target_columns = if reference.columns.is_empty() {
            self.schema
                .tables
                .get(&reference.table)
                .and_then(Table::primary_key)
                .map(|pk| pk.column_names().to_vec())
                .unwrap_or_else(|| vec!["id".to_string()])
        } else {
            reference.columns
        };

        let (Some(column), Some(target_column)) = (columns.first(), target_columns.first()) else {
            return;
        };

        let mut relationship = Relationship::new(&reference.table, target_column, table, column);
        relationship.update_constraint = reference.on_update;
        relationship.delete_constraint = reference.on_delete;

        let constraint = Constraint::ForeignKey {
            name: name.unwrap_or_else(|| {
                relationship_name(&reference.table, target_column, table, column)
            }),
            column_names: columns.clone(),
            target_table_name: reference.table.clone(),
            target_column_names: target_columns.clone(),
            update_constraint: reference.on_update,
            delete_constraint: reference.on_delete,
        };

        let Some(target) = self.table_mut(table, "foreign key") else {
            return;
        };
        target.add_constraint(constraint);
        self.schema.add_relationship(relationship);
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::Lexer;
    use super::super::parser::parse_statement;
    use super::*;
    use crate::schema::{Cardinality, ColumnDefault, ReferenceOption};

    fn convert(statements: &[&str]) -> ConvertState {
        statements
            .iter()
            .flat_map(|sql| {
                let tokens = Lexer::new(sql).tokenize().unwrap();
                lower(parse_statement(&tokens, sql).unwrap())
            })
            .fold(ConvertState::default(), ConvertState::absorb)
    }

    #[test]
    fn test_column_flags_and_constraint_names() {
        let state = convert(&[
            "CREATE TABLE users (id bigint PRIMARY KEY, email varchar(255) NOT NULL UNIQUE, age int CHECK (age >= 0) DEFAULT 0)",
        ]);
        assert!(state.errors.is_empty());
        let users = &state.schema.tables["users"];

        let id = &users.columns["id"];
        assert!(id.primary && id.unique && id.not_null);

        let email = &users.columns["email"];
        assert!(email.not_null && email.unique && !email.primary);
        assert_eq!(email.typ, "varchar(255)");

        let age = &users.columns["age"];
        assert_eq!(age.typ, "integer");
        assert_eq!(age.check.as_deref(), Some("age >= 0"));
        assert_eq!(age.default, Some(ColumnDefault::Integer(0)));

        let names: Vec<&str> = users.constraints.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["PRIMARY_id", "UNIQUE_email", "CHECK_age"]);
    }

    #[test]
    fn test_composite_primary_key() {
        let state = convert(&[
            "CREATE TABLE memberships (user_id bigint, group_id bigint, PRIMARY KEY (user_id, group_id))",
        ]);
        let table = &state.schema.tables["memberships"];
        assert_eq!(
            table.constraints["PRIMARY_user_id_group_id"],
            Constraint::PrimaryKey {
                name: "PRIMARY_user_id_group_id".into(),
                column_names: vec!["user_id".into(), "group_id".into()],
            }
        );
        let user_id = &table.columns["user_id"];
        assert!(user_id.primary && user_id.not_null && !user_id.unique);
    }

    #[test]
    fn test_foreign_keys_become_relationships() {
        let state = convert(&[
            "CREATE TABLE users (id bigint PRIMARY KEY)",
            "CREATE TABLE posts (id bigint PRIMARY KEY, user_id bigint REFERENCES users ON DELETE CASCADE)",
        ]);
        let posts = &state.schema.tables["posts"];
        let name = "users_id_to_posts_user_id";
        assert_eq!(
            posts.constraints[name],
            Constraint::ForeignKey {
                name: name.into(),
                column_names: vec!["user_id".into()],
                target_table_name: "users".into(),
                target_column_names: vec!["id".into()],
                update_constraint: ReferenceOption::NoAction,
                delete_constraint: ReferenceOption::Cascade,
            }
        );
        let rel = &state.schema.relationships[name];
        assert_eq!(rel.primary_table_name, "users");
        assert_eq!(rel.foreign_column_name, "user_id");
        assert_eq!(rel.cardinality, Cardinality::OneToMany);
        assert_eq!(rel.delete_constraint, ReferenceOption::Cascade);
    }

    #[test]
    fn test_alter_table_additions() {
        let state = convert(&[
            "CREATE TABLE users (id bigint)",
            "ALTER TABLE ONLY public.users ADD CONSTRAINT users_pkey PRIMARY KEY (id)",
            "ALTER TABLE users ADD COLUMN nickname text UNIQUE",
        ]);
        let users = &state.schema.tables["users"];
        assert!(users.columns["id"].primary);
        assert!(users.constraints.contains_key("users_pkey"));
        assert!(users.columns["nickname"].unique);
        assert!(users.constraints.contains_key("UNIQUE_nickname"));
    }

    #[test]
    fn test_index_and_comments() {
        let state = convert(&[
            "CREATE TABLE users (id bigint, email text)",
            "CREATE UNIQUE INDEX ON users USING btree (email)",
            "COMMENT ON TABLE users IS 'User table'",
            "COMMENT ON COLUMN users.email IS 'Login'",
        ]);
        let users = &state.schema.tables["users"];
        assert_eq!(
            users.indexes["users_email_idx"],
            Index {
                name: "users_email_idx".into(),
                columns: vec!["email".into()],
                unique: true,
                typ: "btree".into(),
            }
        );
        assert_eq!(users.comment.as_deref(), Some("User table"));
        assert_eq!(users.columns["email"].comment.as_deref(), Some("Login"));
    }

    #[test]
    fn test_missing_targets_are_reported() {
        let state = convert(&[
            "COMMENT ON TABLE ghosts IS 'boo'",
            "CREATE INDEX idx ON ghosts (id)",
        ]);
        assert_eq!(state.errors.len(), 2);
        assert!(state.errors.iter().all(|e| e.name() == "DanglingReferenceError"));
        assert!(state.schema.tables.is_empty());
    }

    #[test]
    fn test_enums_and_extensions() {
        let state = convert(&[
            "CREATE TYPE mood AS ENUM ('sad', 'happy')",
            "CREATE EXTENSION IF NOT EXISTS \"UUID-OSSP\"",
        ]);
        assert_eq!(state.schema.enums["mood"].values, vec!["sad", "happy"]);
        assert!(state.schema.extensions.contains_key("uuid-ossp"));
    }
}
