//! Prisma schema front-end.
//!
//! Models become tables, scalar fields become columns. Fields whose type is
//! another model are relation fields: they produce no column, and the side
//! carrying `@relation(fields: ..., references: ...)` produces the foreign
//! key.

pub mod ast;
pub mod lexer;
pub mod parser;

use std::collections::HashMap;

use tracing::debug;

use self::ast::{Arity, Attribute, Document, EnumBlock, Expr, Field, Model};
use self::parser::Parser;
use super::types::{normalize_prisma_native_type, normalize_prisma_type};
use super::{ProcessError, ProcessResult};
use crate::schema::{
    Cardinality, Column, ColumnDefault, Constraint, Enum, Index, ReferenceOption, Relationship,
    Schema, Table,
};

/// Parse a Prisma schema. Blocks that fail to parse are reported and
/// skipped.
pub fn parse(input: &str) -> ProcessResult {
    let mut parser = match Parser::new(input) {
        Ok(parser) => parser,
        Err(error) => {
            return ProcessResult {
                value: Schema::default(),
                errors: vec![ProcessError::UnexpectedTokenWarning {
                    message: error.to_string(),
                    offset: Some(error.offset()),
                }],
            };
        }
    };

    let (document, parse_errors) = parser.parse();
    let mut errors: Vec<ProcessError> = parse_errors
        .into_iter()
        .map(|e| ProcessError::UnexpectedTokenWarning {
            offset: Some(e.offset()),
            message: e.to_string(),
        })
        .collect();

    let schema = Lowering::new(&document).run(&mut errors);
    debug!(
        tables = schema.tables.len(),
        relationships = schema.relationships.len(),
        "lowered prisma document"
    );

    ProcessResult {
        value: schema,
        errors,
    }
}

struct Lowering<'a> {
    models: HashMap<&'a str, &'a Model>,
    enums: HashMap<&'a str, &'a EnumBlock>,
    document: &'a Document,
}

impl<'a> Lowering<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            models: document.models.iter().map(|m| (m.name.as_str(), m)).collect(),
            enums: document.enums.iter().map(|e| (e.name.as_str(), e)).collect(),
            document,
        }
    }

    fn run(&self, errors: &mut Vec<ProcessError>) -> Schema {
        let mut schema = Schema::default();

        for block in &self.document.enums {
            let name = block.mapped_name.clone().unwrap_or_else(|| block.name.clone());
            schema.enums.insert(
                name.clone(),
                Enum {
                    name,
                    values: block.values.clone(),
                    comment: block.doc.clone(),
                },
            );
        }

        for model in &self.document.models {
            schema.add_table(self.table(model, errors));
        }

        for model in &self.document.models {
            for field in &model.fields {
                if let Some(relation) = field.attribute("relation") {
                    self.foreign_key(&mut schema, model, field, relation, errors);
                }
            }
        }

        schema
    }

    fn is_relation(&self, field: &Field) -> bool {
        self.models.contains_key(field.typ.as_str())
    }

    fn table(&self, model: &Model, errors: &mut Vec<ProcessError>) -> Table {
        let table_name = model.table_name().to_string();
        let mut table = Table::new(&table_name);
        table.comment = model.doc.clone();

        for field in model.fields.iter().filter(|f| !self.is_relation(f)) {
            let column = self.column(field, errors);
            let column_name = column.name.clone();
            table.columns.insert(column_name.clone(), column);

            if field.attribute("id").is_some() {
                table.add_constraint(Constraint::PrimaryKey {
                    name: format!("PRIMARY_{column_name}"),
                    column_names: vec![column_name.clone()],
                });
            }
            if field.attribute("unique").is_some() {
                table.add_constraint(Constraint::Unique {
                    name: format!("UNIQUE_{column_name}"),
                    column_names: vec![column_name],
                });
            }
        }

        for attribute in &model.attributes {
            match attribute.name.as_str() {
                "id" => {
                    let columns = column_names(model, &attribute.ident_list(Some("fields")))
                        .or_else(|| column_names(model, &attribute.ident_list(None)))
                        .unwrap_or_default();
                    let name = constraint_name(attribute, "PRIMARY", &columns);
                    for column in &columns {
                        if let Some(col) = table.columns.get_mut(column) {
                            col.primary = true;
                            col.not_null = true;
                        }
                    }
                    table.add_constraint(Constraint::PrimaryKey {
                        name,
                        column_names: columns,
                    });
                }
                "unique" => {
                    let columns = unique_columns(model, attribute);
                    if let [single] = columns.as_slice() {
                        if let Some(col) = table.columns.get_mut(single) {
                            col.unique = true;
                        }
                    }
                    let name = constraint_name(attribute, "UNIQUE", &columns);
                    table.add_constraint(Constraint::Unique {
                        name,
                        column_names: columns,
                    });
                }
                "index" => {
                    let columns = unique_columns(model, attribute);
                    let name = attribute
                        .str_arg(Some("map"))
                        .or_else(|| attribute.str_arg(Some("name")))
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{table_name}_{}_idx", columns.join("_")));
                    let typ = match attribute.arg(Some("type")) {
                        Some(Expr::Ident(t)) => t.to_lowercase(),
                        _ => String::new(),
                    };
                    table.indexes.insert(
                        name.clone(),
                        Index {
                            name,
                            columns,
                            unique: false,
                            typ,
                        },
                    );
                }
                _ => {}
            }
        }

        table
    }

    fn column(&self, field: &Field, errors: &mut Vec<ProcessError>) -> Column {
        let name = field
            .attribute("map")
            .and_then(|a| a.str_arg(None))
            .unwrap_or(&field.name);

        let native = field
            .attributes
            .iter()
            .find_map(|a| a.name.strip_prefix("db.").map(|n| (n, a)));

        let base = match native {
            Some((native, attribute)) => {
                let args: Vec<String> = attribute
                    .args
                    .iter()
                    .filter_map(|a| match &a.value {
                        Expr::Num(n) => Some(n.clone()),
                        Expr::Str(s) | Expr::Ident(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                normalize_prisma_native_type(native, &args)
            }
            None => match normalize_prisma_type(&field.typ) {
                Some(typ) => typ.to_string(),
                None => match self.enums.get(field.typ.as_str()) {
                    Some(block) => block.mapped_name.clone().unwrap_or_else(|| block.name.clone()),
                    None => field.typ.clone(),
                },
            },
        };
        let typ = match field.arity {
            Arity::List => format!("{base}[]"),
            _ => base,
        };

        let mut column = Column::new(name, typ);
        column.not_null = field.arity != Arity::Optional;
        column.comment = field.doc.clone();
        if field.attribute("id").is_some() {
            column = column.primary();
        }
        if field.attribute("unique").is_some() {
            column.unique = true;
        }
        if let Some(value) = field.attribute("default").and_then(|a| a.arg(None)) {
            column.default = default_value(value);
            if column.default.is_none() {
                errors.push(ProcessError::Unsupported {
                    message: format!("unsupported default on field \"{}\": {value:?}", field.name),
                    offset: None,
                });
            }
        }
        column
    }

    fn foreign_key(
        &self,
        schema: &mut Schema,
        model: &Model,
        field: &Field,
        relation: &Attribute,
        errors: &mut Vec<ProcessError>,
    ) {
        let fields = relation.ident_list(Some("fields"));
        let references = relation.ident_list(Some("references"));
        if fields.is_empty() {
            // Back-relation side, the other model owns the key.
            return;
        }

        let Some(target) = self.models.get(field.typ.as_str()) else {
            return;
        };
        let table_name = model.table_name().to_string();
        let target_table = target.table_name().to_string();

        let (Some(columns), Some(target_columns)) =
            (column_names(model, &fields), column_names(target, &references))
        else {
            errors.push(ProcessError::DanglingReference(format!(
                "relation \"{}\" on \"{table_name}\" names unknown fields",
                field.name
            )));
            return;
        };

        let on_update = prisma_action(relation.arg(Some("onUpdate")));
        let on_delete = prisma_action(relation.arg(Some("onDelete")));
        let name = relation
            .str_arg(Some("map"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{table_name}_{}_fkey", columns.join("_")));

        let (Some(column), Some(target_column)) = (columns.first(), target_columns.first()) else {
            return;
        };

        let mut relationship = Relationship::new(&target_table, target_column, &table_name, column);
        relationship.cardinality = self.cardinality(target, model, &columns, schema);
        relationship.update_constraint = on_update;
        relationship.delete_constraint = on_delete;

        let constraint = Constraint::ForeignKey {
            name,
            column_names: columns.clone(),
            target_table_name: target_table.clone(),
            target_column_names: target_columns.clone(),
            update_constraint: on_update,
            delete_constraint: on_delete,
        };

        if let Some(table) = schema.tables.get_mut(&table_name) {
            table.add_constraint(constraint);
        }
        schema.add_relationship(relationship);
    }

    /// One-to-one when the back-relation on the target is singular or the
    /// foreign key column is itself unique.
    fn cardinality(
        &self,
        target: &Model,
        model: &Model,
        columns: &[String],
        schema: &Schema,
    ) -> Cardinality {
        let back_relation = target.fields.iter().find(|f| f.typ == model.name);
        let unique_key = match columns {
            [single] => schema
                .tables
                .get(model.table_name())
                .and_then(|t| t.columns.get(single))
                .is_some_and(|c| c.unique),
            _ => false,
        };
        match back_relation {
            Some(f) if f.arity != Arity::List => Cardinality::OneToOne,
            None if unique_key => Cardinality::OneToOne,
            _ => Cardinality::OneToMany,
        }
    }
}

/// Map field names to their database column names. `None` if any field is
/// unknown.
fn column_names(model: &Model, fields: &[String]) -> Option<Vec<String>> {
    if fields.is_empty() {
        return None;
    }
    fields
        .iter()
        .map(|name| {
            model.fields.iter().find(|f| &f.name == name).map(|f| {
                f.attribute("map")
                    .and_then(|a| a.str_arg(None))
                    .unwrap_or(&f.name)
                    .to_string()
            })
        })
        .collect()
}

fn unique_columns(model: &Model, attribute: &Attribute) -> Vec<String> {
    column_names(model, &attribute.ident_list(Some("fields")))
        .or_else(|| column_names(model, &attribute.ident_list(None)))
        .unwrap_or_default()
}

fn constraint_name(attribute: &Attribute, prefix: &str, columns: &[String]) -> String {
    attribute
        .str_arg(Some("map"))
        .or_else(|| attribute.str_arg(Some("name")))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{prefix}_{}", columns.join("_")))
}

fn default_value(value: &Expr) -> Option<ColumnDefault> {
    match value {
        Expr::Str(s) => Some(ColumnDefault::Text(s.clone())),
        Expr::Num(n) => n
            .parse::<i64>()
            .map(ColumnDefault::Integer)
            .ok()
            .or_else(|| n.parse::<f64>().ok().map(ColumnDefault::Float)),
        Expr::Ident(b) if b == "true" => Some(ColumnDefault::Boolean(true)),
        Expr::Ident(b) if b == "false" => Some(ColumnDefault::Boolean(false)),
        // Enum member
        Expr::Ident(s) => Some(ColumnDefault::Text(s.clone())),
        Expr::Call(name, args) if name == "dbgenerated" => match args.first() {
            Some(arg) => match &arg.value {
                Expr::Str(s) => Some(ColumnDefault::Text(s.clone())),
                _ => None,
            },
            None => None,
        },
        Expr::Call(name, _) => Some(ColumnDefault::Text(format!("{name}()"))),
        Expr::Array(_) => None,
    }
}

fn prisma_action(value: Option<&Expr>) -> ReferenceOption {
    match value {
        Some(Expr::Ident(action)) => match action.as_str() {
            "Cascade" => ReferenceOption::Cascade,
            "Restrict" => ReferenceOption::Restrict,
            "SetNull" => ReferenceOption::SetNull,
            "SetDefault" => ReferenceOption::SetDefault,
            _ => ReferenceOption::NoAction,
        },
        _ => ReferenceOption::NoAction,
    }
}
