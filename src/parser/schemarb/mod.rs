//! Rails `schema.rb` front-end.

pub mod lexer;
pub mod parser;

use tracing::debug;

use self::parser::{Call, Parser, Value};
use super::types::normalize_schemarb_type;
use super::{ProcessError, ProcessResult};
use crate::extensions::normalize_extension_name;
use crate::schema::{
    Column, ColumnDefault, Constraint, Enum, Extension, Index, ReferenceOption, Relationship,
    Schema, Table,
};

/// Parse a `schema.rb` file into the canonical schema.
pub fn parse(input: &str) -> ProcessResult {
    let (calls, parse_errors) = Parser::new(input).parse();

    let errors = parse_errors
        .into_iter()
        .map(|error| ProcessError::UnexpectedTokenWarning {
            offset: error.offset(),
            message: error.to_string(),
        })
        .collect();

    let builder = calls.iter().fold(
        Builder {
            schema: Schema::default(),
            errors,
        },
        Builder::apply,
    );

    ProcessResult {
        value: builder.schema,
        errors: builder.errors,
    }
}

struct Builder {
    schema: Schema,
    errors: Vec<ProcessError>,
}

struct ForeignKey<'a> {
    table: &'a str,
    column: &'a str,
    target_table: &'a str,
    target_column: &'a str,
    name: Option<&'a str>,
    on_update: ReferenceOption,
    on_delete: ReferenceOption,
}

impl Builder {
    fn apply(mut self, call: &Call) -> Self {
        if call.receiver.is_some() {
            return self;
        }
        match call.name.as_str() {
            "create_table" => self.create_table(call),
            "add_index" => self.add_index(call),
            "add_foreign_key" => self.add_foreign_key(call),
            "add_check_constraint" => self.add_check_constraint(call),
            "create_enum" => self.create_enum(call),
            "enable_extension" => {
                for name in call.strings() {
                    let name = normalize_extension_name(name);
                    self.schema
                        .extensions
                        .insert(name.clone(), Extension { name });
                }
            }
            other => debug!(call = other, "skipping schema.rb call"),
        }
        self
    }

    fn warn(&mut self, call: &Call, message: &str) {
        self.errors.push(ProcessError::UnexpectedTokenWarning {
            message: message.to_string(),
            offset: Some(call.offset),
        });
    }

    fn table_mut(&mut self, name: &str, what: &str) -> Option<&mut Table> {
        if !self.schema.tables.contains_key(name) {
            self.errors.push(ProcessError::DanglingReference(format!(
                "{what} targets missing table \"{name}\""
            )));
        }
        self.schema.tables.get_mut(name)
    }

    fn create_table(&mut self, call: &Call) {
        let Some(name) = call.strings().first().map(|s| s.to_string()) else {
            self.errors.push(ProcessError::Unsupported {
                message: "Expected a string for the table name, but received different data"
                    .to_string(),
                offset: Some(call.offset),
            });
            return;
        };

        let mut table = Table::new(name);
        table.comment = call.option_text("comment").map(str::to_string);

        match call.option("primary_key") {
            // composite keys come with `id: false` semantics
            Some(Value::Array(items)) => {
                let columns: Vec<String> = items
                    .iter()
                    .filter_map(Value::as_text)
                    .map(str::to_string)
                    .collect();
                table.add_constraint(Constraint::PrimaryKey {
                    name: format!("PRIMARY_{}", columns.join("_")),
                    column_names: columns,
                });
            }
            primary_key if !call.option_is("id", false) => {
                let id_name = primary_key.and_then(Value::as_text).unwrap_or("id");
                // Rails' PostgreSQL adapter defaults primary keys to bigserial.
                let id_type = call
                    .option("id")
                    .and_then(Value::as_text)
                    .map_or_else(|| "bigserial".to_string(), normalize_schemarb_type);
                let mut id = Column::new(id_name, id_type).primary();
                id.default = call.option("default").and_then(default_value);
                table.columns.insert(id.name.clone(), id);
                table.add_constraint(Constraint::PrimaryKey {
                    name: format!("PRIMARY_{id_name}"),
                    column_names: vec![id_name.to_string()],
                });
            }
            _ => {}
        }

        let mut foreign_keys = Vec::new();
        for inner in &call.block {
            if inner.receiver.is_none() {
                continue;
            }
            match inner.name.as_str() {
                "index" => {
                    let index = index_from_call(&table.name, inner, 0);
                    add_index(&mut table, index);
                }
                "check_constraint" => match inner.strings().first() {
                    Some(detail) => {
                        let name = inner
                            .option_text("name")
                            .map(str::to_string)
                            .unwrap_or_else(|| check_name(&table));
                        table.add_constraint(Constraint::Check {
                            name,
                            detail: detail.to_string(),
                        });
                    }
                    None => self.warn(inner, "Check constraint must have one string of its detail"),
                },
                "references" | "belongs_to" => {
                    foreign_keys.extend(references(&mut table, inner));
                }
                "timestamps" => {
                    let not_null = !inner.option_is("null", true);
                    for name in ["created_at", "updated_at"] {
                        let mut column = Column::new(name, "timestamp");
                        column.not_null = not_null;
                        table.columns.insert(name.to_string(), column);
                    }
                }
                typ => {
                    for name in inner.strings() {
                        let column = column_from_call(typ, name, inner);
                        if column.unique {
                            table.add_constraint(Constraint::Unique {
                                name: format!("UNIQUE_{name}"),
                                column_names: vec![name.to_string()],
                            });
                        }
                        table.columns.insert(column.name.clone(), column);
                    }
                }
            }
        }

        mark_primary_columns(&mut table);
        let table_name = table.name.clone();
        self.schema.add_table(table);

        for (column, target) in foreign_keys {
            self.link(ForeignKey {
                table: &table_name,
                column: &column,
                target_table: &target,
                target_column: "id",
                name: None,
                on_update: ReferenceOption::NoAction,
                on_delete: ReferenceOption::NoAction,
            });
        }
    }

    fn add_index(&mut self, call: &Call) {
        let Some(table_name) = call.strings().first().map(|s| s.to_string()) else {
            self.warn(call, "add_index needs a table name");
            return;
        };
        let index = index_from_call(&table_name, call, 1);
        if let Some(table) = self.table_mut(&table_name, "index") {
            add_index(table, index);
        }
    }

    fn add_check_constraint(&mut self, call: &Call) {
        let strings = call.strings();
        let [table_name, detail] = strings.as_slice() else {
            self.warn(call, "Check constraint must have one table name and its detail");
            return;
        };
        let name = call.option_text("name").map(str::to_string);
        let detail = detail.to_string();
        if let Some(table) = self.table_mut(table_name, "check constraint") {
            let name = name.unwrap_or_else(|| check_name(table));
            table.add_constraint(Constraint::Check { name, detail });
        }
    }

    fn add_foreign_key(&mut self, call: &Call) {
        let strings = call.strings();
        let [from_table, to_table] = strings.as_slice() else {
            self.warn(call, "Foreign key relationship must have two table names");
            return;
        };

        let column = call
            .option_text("column")
            .map_or_else(|| format!("{}_id", singularize(to_table)), str::to_string);
        let primary_key = call.option_text("primary_key").unwrap_or("id");
        let action = |key: &str| {
            call.option_text(key)
                .and_then(ReferenceOption::from_sql)
                .unwrap_or_default()
        };

        self.link(ForeignKey {
            table: from_table,
            column: &column,
            target_table: to_table,
            target_column: primary_key,
            name: call.option_text("name"),
            on_update: action("on_update"),
            on_delete: action("on_delete"),
        });
    }

    fn link(&mut self, fk: ForeignKey<'_>) {
        let Some(from) = self.table_mut(fk.table, "foreign key") else {
            return;
        };
        let name = fk
            .name
            .map_or_else(|| format!("fk_{}_{}", fk.table, fk.column), str::to_string);
        from.add_constraint(Constraint::ForeignKey {
            name,
            column_names: vec![fk.column.to_string()],
            target_table_name: fk.target_table.to_string(),
            target_column_names: vec![fk.target_column.to_string()],
            update_constraint: fk.on_update,
            delete_constraint: fk.on_delete,
        });

        let mut relationship =
            Relationship::new(fk.target_table, fk.target_column, fk.table, fk.column);
        relationship.update_constraint = fk.on_update;
        relationship.delete_constraint = fk.on_delete;
        self.schema.add_relationship(relationship);
    }

    fn create_enum(&mut self, call: &Call) {
        let Some(name) = call.strings().first().map(|s| s.to_string()) else {
            self.warn(call, "create_enum needs a name");
            return;
        };
        let values = call.args.get(1).map(Value::texts).unwrap_or_default();
        self.schema.enums.insert(
            name.clone(),
            Enum {
                name,
                values,
                comment: None,
            },
        );
    }
}

fn column_from_call(method: &str, name: &str, call: &Call) -> Column {
    let mut typ = normalize_schemarb_type(method);
    if let Some(Value::Int(limit)) = call.option("limit") {
        if typ == "varchar" || typ == "char" {
            typ = format!("{typ}({limit})");
        }
    }
    if let Some(Value::Int(precision)) = call.option("precision") {
        typ = match call.option("scale") {
            Some(Value::Int(scale)) => format!("{typ}({precision},{scale})"),
            _ => format!("{typ}({precision})"),
        };
    }
    if call.option_is("array", true) {
        typ.push_str("[]");
    }

    let mut column = Column::new(name, typ);
    column.not_null = call.option_is("null", false);
    column.unique = call.option_is("unique", true);
    column.default = call.option("default").and_then(default_value);
    column.comment = call.option_text("comment").map(str::to_string);
    column
}

fn default_value(value: &Value) -> Option<ColumnDefault> {
    match value {
        Value::Bool(b) => Some(ColumnDefault::Boolean(*b)),
        Value::Int(n) => Some(ColumnDefault::Integer(*n)),
        Value::Float(n) => Some(ColumnDefault::Float(*n)),
        Value::Str(s) | Value::Lambda(Some(s)) => Some(ColumnDefault::Text(s.clone())),
        _ => None,
    }
}

/// `t.index` (columns are the first argument) and `add_index` (the second).
fn index_from_call(table: &str, call: &Call, column_arg: usize) -> Index {
    let columns = call.args.get(column_arg).map(Value::texts).unwrap_or_default();
    let name = call
        .option_text("name")
        .map_or_else(|| format!("index_{table}_on_{}", columns.join("_and_")), str::to_string);
    Index {
        name,
        columns,
        unique: call.option_is("unique", true),
        typ: call.option_text("using").unwrap_or_default().to_string(),
    }
}

fn add_index(table: &mut Table, index: Index) {
    if index.unique && !index.columns.is_empty() {
        table.add_constraint(Constraint::Unique {
            name: format!("UNIQUE_{}", index.columns.join("_")),
            column_names: index.columns.clone(),
        });
        if let [column] = index.columns.as_slice() {
            if let Some(column) = table.columns.get_mut(column) {
                column.unique = true;
            }
        }
    }
    table.indexes.insert(index.name.clone(), index);
}

/// `t.references :user` adds `user_id`, an index, and optionally a foreign
/// key to `users`. Returns `(column, target table)` for the foreign key.
fn references(table: &mut Table, call: &Call) -> Option<(String, String)> {
    let reference = call.args.first().and_then(Value::as_text)?;
    let column_name = format!("{reference}_id");

    let typ = call
        .option_text("type")
        .map_or_else(|| "bigint".to_string(), normalize_schemarb_type);
    let mut column = Column::new(&column_name, typ);
    column.not_null = call.option_is("null", false);
    column.comment = call.option_text("comment").map(str::to_string);
    table.columns.insert(column_name.clone(), column);

    if call.option_is("polymorphic", true) {
        let type_column = format!("{reference}_type");
        table
            .columns
            .insert(type_column.clone(), Column::new(type_column, "varchar"));
    }

    if !call.option_is("index", false) {
        let index = Index {
            name: format!("index_{}_on_{column_name}", table.name),
            columns: vec![column_name.clone()],
            unique: false,
            typ: String::new(),
        };
        add_index(table, index);
    }

    call.option_is("foreign_key", true)
        .then(|| (column_name, pluralize(reference)))
}

fn check_name(table: &Table) -> String {
    let base = format!("CHECK_{}", table.name);
    if !table.constraints.contains_key(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|name| !table.constraints.contains_key(name))
        .unwrap_or(base)
}

fn mark_primary_columns(table: &mut Table) {
    let Some(Constraint::PrimaryKey { column_names, .. }) = table.primary_key().cloned() else {
        return;
    };
    let single = column_names.len() == 1;
    for name in &column_names {
        if let Some(column) = table.columns.get_mut(name) {
            column.primary = true;
            column.not_null = true;
            column.unique |= single;
        }
    }
}

/// English singular of a table name, for Rails' `{singular}_id` convention.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

pub fn pluralize(word: &str) -> String {
    let vowel_before_y = word
        .strip_suffix('y')
        .and_then(|stem| stem.chars().last())
        .is_some_and(|c| "aeiou".contains(c));
    if let Some(stem) = word.strip_suffix('y').filter(|_| !vowel_before_y) {
        return format!("{stem}ies");
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;

    const SCHEMA: &str = r#"
# This file is auto-generated from the current state of the database.
ActiveRecord::Schema[7.1].define(version: 2024_03_01_120000) do
  enable_extension "plpgsql"
  enable_extension "uuid-ossp"

  create_table "users", comment: "Registered people", force: :cascade do |t|
    t.string "email", null: false, limit: 255, comment: "Login"
    t.boolean "admin", default: false
    t.integer "age", default: 18
    t.datetime "created_at", default: -> { "CURRENT_TIMESTAMP" }, null: false
    t.index ["email"], name: "index_users_on_email", unique: true
    t.check_constraint "age >= 0", name: "age_positive"
  end

  create_table "posts", id: :uuid, force: :cascade do |t|
    t.bigint "user_id", null: false
    t.string "title"
    t.decimal "score", precision: 10, scale: 2
  end

  create_table "tags", id: false, force: :cascade do |t|
    t.string "name"
  end

  add_foreign_key "posts", "users", on_delete: :cascade
  add_check_constraint "posts", "char_length(title) > 0", name: "title_present"
end
"#;

    #[test]
    fn test_tables_and_columns() {
        let result = parse(SCHEMA);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let schema = &result.value;
        assert_eq!(
            schema.tables.keys().collect::<Vec<_>>(),
            vec!["users", "posts", "tags"]
        );

        let users = &schema.tables["users"];
        assert_eq!(users.comment.as_deref(), Some("Registered people"));
        let id = &users.columns["id"];
        assert_eq!(id.typ, "bigserial");
        assert!(id.primary && id.not_null && id.unique);

        let email = &users.columns["email"];
        assert_eq!(email.typ, "varchar(255)");
        assert!(email.not_null && email.unique);
        assert_eq!(email.comment.as_deref(), Some("Login"));

        assert_eq!(users.columns["admin"].default, Some(ColumnDefault::Boolean(false)));
        assert_eq!(users.columns["age"].default, Some(ColumnDefault::Integer(18)));
        assert_eq!(
            users.columns["created_at"].default,
            Some(ColumnDefault::Text("CURRENT_TIMESTAMP".into()))
        );
        assert_eq!(users.columns["created_at"].typ, "timestamp");
        assert!(users.indexes["index_users_on_email"].unique);
        assert!(users.constraints.contains_key("UNIQUE_email"));
        assert!(users.constraints.contains_key("age_positive"));

        let posts = &schema.tables["posts"];
        assert_eq!(posts.columns["id"].typ, "uuid");
        assert_eq!(posts.columns["score"].typ, "decimal(10,2)");
        assert!(posts.constraints.contains_key("title_present"));

        assert!(!schema.tables["tags"].columns.contains_key("id"));
        assert!(schema.extensions.contains_key("uuid-ossp"));
    }

    #[test]
    fn test_foreign_keys() {
        let result = parse(SCHEMA);
        let posts = &result.value.tables["posts"];
        assert_eq!(
            posts.constraints["fk_posts_user_id"],
            Constraint::ForeignKey {
                name: "fk_posts_user_id".into(),
                column_names: vec!["user_id".into()],
                target_table_name: "users".into(),
                target_column_names: vec!["id".into()],
                update_constraint: ReferenceOption::NoAction,
                delete_constraint: ReferenceOption::Cascade,
            }
        );
        let rel = &result.value.relationships["users_id_to_posts_user_id"];
        assert_eq!(rel.cardinality, Cardinality::OneToMany);
        assert_eq!(rel.delete_constraint, ReferenceOption::Cascade);
    }

    #[test]
    fn test_nullify_and_custom_column() {
        let result = parse(
            "create_table \"people\"\ncreate_table \"notes\" do |t|\n  t.bigint \"owner_id\"\nend\n\
             add_foreign_key \"notes\", \"people\", column: \"owner_id\", on_delete: :nullify, name: \"fk_owner\"\n",
        );
        let notes = &result.value.tables["notes"];
        match &notes.constraints["fk_owner"] {
            Constraint::ForeignKey {
                column_names,
                delete_constraint,
                ..
            } => {
                assert_eq!(column_names, &vec!["owner_id".to_string()]);
                assert_eq!(*delete_constraint, ReferenceOption::SetNull);
            }
            other => panic!("expected foreign key, got {other:?}"),
        }
    }

    #[test]
    fn test_references() {
        let result = parse(
            "create_table \"users\"\ncreate_table \"comments\" do |t|\n  t.references \"user\", null: false, foreign_key: true\nend\n",
        );
        let comments = &result.value.tables["comments"];
        assert!(comments.columns["user_id"].not_null);
        assert!(comments.indexes.contains_key("index_comments_on_user_id"));
        assert!(comments.constraints.contains_key("fk_comments_user_id"));
        assert!(result.value.relationships.contains_key("users_id_to_comments_user_id"));
    }

    #[test]
    fn test_enum_and_errors() {
        let result = parse(
            "create_enum \"mood\", [\"sad\", \"ok\"]\ncreate_table :users\nadd_foreign_key \"posts\"\n",
        );
        assert_eq!(result.value.enums["mood"].values, vec!["sad", "ok"]);
        let names: Vec<&str> = result.errors.iter().map(ProcessError::name).collect();
        assert_eq!(names, vec!["UnsupportedTokenError", "UnexpectedTokenWarningError"]);
    }

    #[test]
    fn test_inflection() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("status"), "status");
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
    }
}
