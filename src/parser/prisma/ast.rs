#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub models: Vec<Model>,
    pub enums: Vec<EnumBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    /// `@@id`, `@@unique`, `@@index`, `@@map`
    pub attributes: Vec<Attribute>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub typ: String,
    pub arity: Arity,
    pub attributes: Vec<Attribute>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    Required, // T
    Optional, // T?
    List,     // T[]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Dotted name without the `@`: `id`, `default`, `db.VarChar`
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Num(String),
    Ident(String),
    Call(String, Vec<Arg>),
    Array(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumBlock {
    pub name: String,
    pub values: Vec<String>,
    pub mapped_name: Option<String>,
    pub doc: Option<String>,
}

impl Attribute {
    /// Named argument, or the first positional one when `name` is `None`.
    pub fn arg(&self, name: Option<&str>) -> Option<&Expr> {
        match name {
            Some(name) => self
                .args
                .iter()
                .find(|a| a.name.as_deref() == Some(name))
                .map(|a| &a.value),
            None => self.args.iter().find(|a| a.name.is_none()).map(|a| &a.value),
        }
    }

    /// `fields: [a, b]` style list of identifiers.
    pub fn ident_list(&self, name: Option<&str>) -> Vec<String> {
        match self.arg(name) {
            Some(Expr::Array(items)) => items
                .iter()
                .filter_map(|e| match e {
                    Expr::Ident(s) => Some(s.clone()),
                    // `@@index([name(ops: raw("..."))])`
                    Expr::Call(s, _) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            Some(Expr::Ident(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn str_arg(&self, name: Option<&str>) -> Option<&str> {
        match self.arg(name) {
            Some(Expr::Str(s)) => Some(s),
            _ => None,
        }
    }
}

impl Field {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

impl Model {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Table name after `@@map`.
    pub fn table_name(&self) -> &str {
        self.attribute("map")
            .and_then(|a| a.str_arg(None))
            .unwrap_or(&self.name)
    }
}
