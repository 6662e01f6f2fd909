//! Canonical schema model shared by every front-end and the deparser.
//!
//! The JSON shape of these types is the data contract with the outside
//! world: patches address it by pointer, so field names and map keys
//! must stay stable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type Tables = IndexMap<String, Table>;
pub type Columns = IndexMap<String, Column>;
pub type Indexes = IndexMap<String, Index>;
pub type Constraints = IndexMap<String, Constraint>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub tables: Tables,
    #[serde(default)]
    pub relationships: IndexMap<String, Relationship>,
    #[serde(default)]
    pub table_groups: IndexMap<String, TableGroup>,
    #[serde(default)]
    pub enums: IndexMap<String, Enum>,
    #[serde(default)]
    pub extensions: IndexMap<String, Extension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub columns: Columns,
    #[serde(default)]
    pub indexes: Indexes,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub default: Option<ColumnDefault>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// A literal column default. Non-literal SQL expressions (`now()`,
/// `CURRENT_TIMESTAMP`) are kept as [`ColumnDefault::Text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnDefault {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    /// Access method, empty when unspecified.
    #[serde(rename = "type", default)]
    pub typ: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Constraint {
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey {
        name: String,
        column_names: Vec<String>,
    },
    #[serde(rename = "UNIQUE")]
    Unique {
        name: String,
        column_names: Vec<String>,
    },
    #[serde(rename = "CHECK")]
    Check { name: String, detail: String },
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey {
        name: String,
        column_names: Vec<String>,
        target_table_name: String,
        target_column_names: Vec<String>,
        #[serde(default)]
        update_constraint: ReferenceOption,
        #[serde(default)]
        delete_constraint: ReferenceOption,
    },
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::PrimaryKey { name, .. }
            | Constraint::Unique { name, .. }
            | Constraint::Check { name, .. }
            | Constraint::ForeignKey { name, .. } => name,
        }
    }

    /// Columns the constraint is declared on. Empty for CHECK.
    pub fn column_names(&self) -> &[String] {
        match self {
            Constraint::PrimaryKey { column_names, .. }
            | Constraint::Unique { column_names, .. }
            | Constraint::ForeignKey { column_names, .. } => column_names,
            Constraint::Check { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceOption {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    #[default]
    NoAction,
}

impl ReferenceOption {
    /// Match an action phrase such as `SET NULL` or `cascade`.
    pub fn from_sql(action: &str) -> Option<Self> {
        let words: Vec<String> = action
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_uppercase())
            .collect();
        match words.join(" ").as_str() {
            "CASCADE" => Some(Self::Cascade),
            "RESTRICT" => Some(Self::Restrict),
            "SET NULL" | "NULLIFY" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            "NO ACTION" => Some(Self::NoAction),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub name: String,
    pub primary_table_name: String,
    pub primary_column_name: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub update_constraint: ReferenceOption,
    #[serde(default)]
    pub delete_constraint: ReferenceOption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    OneToOne,
    #[default]
    OneToMany,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableGroup {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
}

/// Deterministic relationship name. Equal relationships always get equal
/// names, which keeps diffs between repeated parses empty.
pub fn relationship_name(
    primary_table: &str,
    primary_column: &str,
    foreign_table: &str,
    foreign_column: &str,
) -> String {
    format!("{primary_table}_{primary_column}_to_{foreign_table}_{foreign_column}")
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            constraints: IndexMap::new(),
            comment: None,
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.insert(constraint.name().to_string(), constraint);
    }

    /// The table's primary key constraint, if any.
    pub fn primary_key(&self) -> Option<&Constraint> {
        self.constraints
            .values()
            .find(|c| matches!(c, Constraint::PrimaryKey { .. }))
    }
}

impl Column {
    pub fn new(name: impl Into<String>, typ: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: typ.into(),
            default: None,
            check: None,
            primary: false,
            not_null: false,
            unique: false,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Primary key columns are implicitly unique and NOT NULL.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self.not_null = true;
        self
    }
}

impl Relationship {
    /// Build a relationship from the referenced (primary) side and the
    /// referencing (foreign) side.
    pub fn new(
        primary_table: &str,
        primary_column: &str,
        foreign_table: &str,
        foreign_column: &str,
    ) -> Self {
        Self {
            name: relationship_name(primary_table, primary_column, foreign_table, foreign_column),
            primary_table_name: primary_table.to_string(),
            primary_column_name: primary_column.to_string(),
            foreign_table_name: foreign_table.to_string(),
            foreign_column_name: foreign_column.to_string(),
            cardinality: Cardinality::OneToMany,
            update_constraint: ReferenceOption::NoAction,
            delete_constraint: ReferenceOption::NoAction,
        }
    }
}

impl Schema {
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn add_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .insert(relationship.name.clone(), relationship);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relationship_name_is_deterministic() {
        let a = Relationship::new("users", "id", "posts", "user_id");
        let b = Relationship::new("users", "id", "posts", "user_id");
        assert_eq!(a.name, "users_id_to_posts_user_id");
        assert_eq!(a, b);
    }

    #[test]
    fn test_column_json_shape() {
        let mut col = Column::new("email", "varchar(255)").not_null();
        col.default = Some(ColumnDefault::Text("x".into()));
        let value = serde_json::to_value(&col).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "email",
                "type": "varchar(255)",
                "default": "x",
                "check": null,
                "primary": false,
                "notNull": true,
                "unique": false,
                "comment": null
            })
        );
    }

    #[test]
    fn test_constraint_tags() {
        let fk = Constraint::ForeignKey {
            name: "fk".into(),
            column_names: vec!["user_id".into()],
            target_table_name: "users".into(),
            target_column_names: vec!["id".into()],
            update_constraint: ReferenceOption::Cascade,
            delete_constraint: ReferenceOption::SetNull,
        };
        let value = serde_json::to_value(&fk).unwrap();
        assert_eq!(value["type"], "FOREIGN KEY");
        assert_eq!(value["targetTableName"], "users");
        assert_eq!(value["deleteConstraint"], "SET_NULL");

        let back: Constraint = serde_json::from_value(value).unwrap();
        assert_eq!(back, fk);
    }

    #[test]
    fn test_default_values_untagged() {
        let parsed: Vec<ColumnDefault> =
            serde_json::from_value(json!([true, 42, 1.5, "now()"])).unwrap();
        assert_eq!(
            parsed,
            vec![
                ColumnDefault::Boolean(true),
                ColumnDefault::Integer(42),
                ColumnDefault::Float(1.5),
                ColumnDefault::Text("now()".into()),
            ]
        );
    }

    #[test]
    fn test_reference_option_from_sql() {
        assert_eq!(ReferenceOption::from_sql("set null"), Some(ReferenceOption::SetNull));
        assert_eq!(ReferenceOption::from_sql("SET_DEFAULT"), Some(ReferenceOption::SetDefault));
        assert_eq!(ReferenceOption::from_sql("nullify"), Some(ReferenceOption::SetNull));
        assert_eq!(ReferenceOption::from_sql("bogus"), None);
    }

    #[test]
    fn test_schema_deserializes_with_missing_maps() {
        let schema: Schema = serde_json::from_value(json!({"tables": {}})).unwrap();
        assert!(schema.relationships.is_empty());
        assert!(schema.enums.is_empty());
    }
}
