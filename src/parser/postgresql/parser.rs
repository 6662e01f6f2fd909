//! Statement parser for the DDL subset the front-end understands.
//!
//! Works on the tokens of a single statement (without the terminating
//! semicolon). Statements outside the subset parse to [`Statement::Other`].

use thiserror::Error;

use super::lexer::{Spanned, Token};
use crate::schema::{ColumnDefault, ReferenceOption};

static EOF: Token = Token::Eof;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlParseError {
    #[error("syntax error at or near {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },
    #[error("unexpected end of statement, expected {expected}")]
    UnexpectedEof { expected: &'static str },
}

impl SqlParseError {
    pub fn offset(&self) -> Option<usize> {
        match self {
            SqlParseError::UnexpectedToken { offset, .. } => Some(*offset),
            SqlParseError::UnexpectedEof { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    CreateEnum { name: String, values: Vec<String> },
    CreateExtension { name: String },
    Comment(CommentOn),
    AlterTable(AlterTable),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub elements: Vec<TableElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableElement {
    Column(ColumnDef),
    Constraint(TableConstraint),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub constraints: Vec<ColumnConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey { name: Option<String> },
    NotNull,
    Null,
    Unique { name: Option<String> },
    /// `None` for an explicit `DEFAULT NULL`.
    Default(Option<ColumnDefault>),
    Check { name: Option<String>, detail: String },
    References {
        name: Option<String>,
        reference: ForeignKeyRef,
    },
    /// COLLATE, GENERATED, DEFERRABLE and friends
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRef {
    pub table: String,
    /// Empty when the referenced table's primary key is implied.
    pub columns: Vec<String>,
    pub on_update: ReferenceOption,
    pub on_delete: ReferenceOption,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<String>,
    pub kind: TableConstraintKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    Check(String),
    ForeignKey {
        columns: Vec<String>,
        reference: ForeignKeyRef,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub name: Option<String>,
    pub table: String,
    pub unique: bool,
    pub method: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentOn {
    Table {
        table: String,
        comment: Option<String>,
    },
    Column {
        table: String,
        column: String,
        comment: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: String,
    pub commands: Vec<AlterCommand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterCommand {
    AddConstraint(TableConstraint),
    AddColumn(ColumnDef),
    Other,
}

/// Parse one statement. `source` is the text the token spans point into.
pub fn parse_statement(tokens: &[Spanned], source: &str) -> Result<Statement, SqlParseError> {
    Parser {
        tokens,
        pos: 0,
        source,
    }
    .parse()
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &'a Token {
        self.tokens.get(self.pos).map_or(&EOF, |s| &s.token)
    }

    fn peek_next(&self) -> &'a Token {
        self.tokens.get(self.pos + 1).map_or(&EOF, |s| &s.token)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn unexpected(&self, expected: &'static str) -> SqlParseError {
        match self.tokens.get(self.pos) {
            None => SqlParseError::UnexpectedEof { expected },
            Some(spanned) => SqlParseError::UnexpectedToken {
                found: format!("\"{}\"", &self.source[spanned.start..spanned.end]),
                expected,
                offset: spanned.start,
            },
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), SqlParseError> {
        if *self.current() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, SqlParseError> {
        match self.current().ident_text() {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected(expected)),
        }
    }

    /// `a.b.c` keeps only the last part; schema qualifiers are dropped.
    fn parse_qualified_name(&mut self, expected: &'static str) -> Result<String, SqlParseError> {
        Ok(self.parse_name_parts(expected)?.pop().unwrap_or_default())
    }

    fn parse_name_parts(&mut self, expected: &'static str) -> Result<Vec<String>, SqlParseError> {
        let mut parts = vec![self.expect_ident(expected)?];
        while *self.current() == Token::Dot {
            self.advance();
            parts.push(self.expect_ident(expected)?);
        }
        Ok(parts)
    }

    fn skip_if_not_exists(&mut self) {
        if *self.current() == Token::If {
            self.advance();
            if *self.current() == Token::Not {
                self.advance();
            }
            if *self.current() == Token::Exists {
                self.advance();
            }
        }
    }

    fn skip_if_exists(&mut self) {
        if *self.current() == Token::If && *self.peek_next() == Token::Exists {
            self.advance();
            self.advance();
        }
    }

    fn parse(&mut self) -> Result<Statement, SqlParseError> {
        match self.current() {
            Token::Create => {
                self.advance();
                self.parse_create()
            }
            Token::Alter => {
                self.advance();
                if *self.current() != Token::Table {
                    return Ok(Statement::Other);
                }
                self.advance();
                self.parse_alter_table()
            }
            Token::Comment => self.parse_comment(),
            _ => Ok(Statement::Other),
        }
    }

    fn parse_create(&mut self) -> Result<Statement, SqlParseError> {
        let mut unique = false;
        loop {
            match self.current() {
                Token::Unique => unique = true,
                tok if tok.is_word("or") || tok.is_word("replace") => {}
                tok if ["unlogged", "temp", "temporary", "global", "local"]
                    .iter()
                    .any(|w| tok.is_word(w)) => {}
                _ => break,
            }
            self.advance();
        }

        match self.current() {
            Token::Table => {
                self.advance();
                self.parse_create_table()
            }
            Token::Index => {
                self.advance();
                self.parse_create_index(unique)
            }
            Token::Type => {
                self.advance();
                self.parse_create_type()
            }
            Token::Extension => {
                self.advance();
                self.skip_if_not_exists();
                let name = self.expect_ident("extension name")?;
                Ok(Statement::CreateExtension { name })
            }
            _ => Ok(Statement::Other),
        }
    }

    fn parse_create_table(&mut self) -> Result<Statement, SqlParseError> {
        self.skip_if_not_exists();
        let name = self.parse_qualified_name("table name")?;

        match self.current() {
            Token::LParen => self.advance(),
            Token::Eof => return Err(self.unexpected("'('")),
            // CREATE TABLE ... AS / PARTITION OF / OF type
            _ => return Ok(Statement::Other),
        }

        let mut elements = Vec::new();
        if *self.current() == Token::RParen {
            self.advance();
            return Ok(Statement::CreateTable(CreateTable { name, elements }));
        }

        loop {
            match self.current() {
                Token::Constraint
                | Token::Primary
                | Token::Unique
                | Token::Check
                | Token::Foreign => {
                    elements.push(TableElement::Constraint(self.parse_table_constraint()?));
                }
                tok if tok.is_word("like") || tok.is_word("exclude") => self.skip_element(),
                _ => elements.push(TableElement::Column(self.parse_column_def()?)),
            }

            match self.current() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }

        // INHERITS, PARTITION BY, WITH (...) and the like carry nothing we keep.
        Ok(Statement::CreateTable(CreateTable { name, elements }))
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef, SqlParseError> {
        let name = self.expect_ident("column name")?;
        let type_name = self.parse_type_name()?;

        let mut constraints = Vec::new();
        while !matches!(self.current(), Token::Comma | Token::RParen | Token::Eof) {
            constraints.push(self.parse_column_constraint()?);
        }

        Ok(ColumnDef {
            name,
            type_name,
            constraints,
        })
    }

    fn is_type_stop(token: &Token) -> bool {
        matches!(
            token,
            Token::Primary
                | Token::Not
                | Token::Null
                | Token::Unique
                | Token::Default
                | Token::References
                | Token::Check
                | Token::Constraint
                | Token::Collate
                | Token::Generated
                | Token::Comma
                | Token::RParen
                | Token::Eof
        )
    }

    fn parse_type_name(&mut self) -> Result<String, SqlParseError> {
        let mut text = String::new();
        let mut depth = 0usize;

        loop {
            let token = self.current();
            if depth == 0 && Self::is_type_stop(token) {
                break;
            }
            match token {
                Token::LParen | Token::LBracket => {
                    depth += 1;
                    text.push(if *token == Token::LParen { '(' } else { '[' });
                }
                Token::RParen | Token::RBracket => {
                    depth = depth.saturating_sub(1);
                    text.push(if *token == Token::RParen { ')' } else { ']' });
                }
                Token::Comma => text.push(','),
                Token::Num(n) => text.push_str(n),
                // public.my_type keeps the type name only
                Token::Dot => text.clear(),
                Token::Eof => return Err(self.unexpected("')'")),
                tok => match tok.ident_text() {
                    Some(word) => {
                        if !text.is_empty() && !text.ends_with(['(', '.']) {
                            text.push(' ');
                        }
                        text.push_str(&word);
                    }
                    None => break,
                },
            }
            self.advance();
        }

        if text.is_empty() {
            return Err(self.unexpected("column type"));
        }
        Ok(text)
    }

    fn parse_column_constraint(&mut self) -> Result<ColumnConstraint, SqlParseError> {
        let name = if *self.current() == Token::Constraint {
            self.advance();
            Some(self.expect_ident("constraint name")?)
        } else {
            None
        };

        let constraint = match self.current() {
            Token::Primary => {
                self.advance();
                self.expect(Token::Key, "KEY")?;
                ColumnConstraint::PrimaryKey { name }
            }
            Token::Not => {
                self.advance();
                match self.current() {
                    Token::Null => {
                        self.advance();
                        ColumnConstraint::NotNull
                    }
                    tok if tok.is_word("deferrable") => {
                        self.advance();
                        ColumnConstraint::Ignored
                    }
                    _ => return Err(self.unexpected("NULL")),
                }
            }
            Token::Null => {
                self.advance();
                ColumnConstraint::Null
            }
            Token::Unique => {
                self.advance();
                self.skip_nulls_distinct();
                ColumnConstraint::Unique { name }
            }
            Token::Default => {
                self.advance();
                ColumnConstraint::Default(self.parse_default_expr()?)
            }
            Token::Check => {
                self.advance();
                let detail = self.parse_paren_expr()?;
                self.skip_no_inherit();
                ColumnConstraint::Check { name, detail }
            }
            Token::References => {
                self.advance();
                ColumnConstraint::References {
                    name,
                    reference: self.parse_reference()?,
                }
            }
            Token::Collate => {
                self.advance();
                self.parse_qualified_name("collation")?;
                ColumnConstraint::Ignored
            }
            Token::Generated => {
                self.skip_element();
                ColumnConstraint::Ignored
            }
            tok if ["deferrable", "initially", "immediate", "deferred"]
                .iter()
                .any(|w| tok.is_word(w)) =>
            {
                self.advance();
                ColumnConstraint::Ignored
            }
            _ => return Err(self.unexpected("column constraint")),
        };
        Ok(constraint)
    }

    fn is_default_stop(token: &Token) -> bool {
        matches!(
            token,
            Token::Primary
                | Token::Not
                | Token::Null
                | Token::Unique
                | Token::Default
                | Token::References
                | Token::Check
                | Token::Constraint
                | Token::Collate
                | Token::Generated
        )
    }

    /// Literal defaults become typed values; anything else keeps its SQL text.
    fn parse_default_expr(&mut self) -> Result<Option<ColumnDefault>, SqlParseError> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            let token = self.current();
            match token {
                Token::Eof => break,
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => break,
                Token::RParen => depth -= 1,
                Token::Comma if depth == 0 => break,
                tok if depth == 0 && self.pos > start && Self::is_default_stop(tok) => break,
                _ => {}
            }
            self.advance();
        }
        if depth > 0 {
            return Err(self.unexpected("')'"));
        }

        let expr = &self.tokens[start..self.pos];
        let Some((first, last)) = expr.first().zip(expr.last()) else {
            return Err(self.unexpected("default expression"));
        };

        let is_literal = expr.len() == 1 || expr.get(1).is_some_and(|s| s.token == Token::DoubleColon);
        let literal = match &first.token {
            Token::Null if expr.len() == 1 => return Ok(None),
            Token::Str(s) if is_literal => Some(ColumnDefault::Text(s.clone())),
            Token::True if is_literal => Some(ColumnDefault::Boolean(true)),
            Token::False if is_literal => Some(ColumnDefault::Boolean(false)),
            Token::Num(n) if is_literal => Some(match n.parse::<i64>() {
                Ok(i) => ColumnDefault::Integer(i),
                Err(_) => n
                    .parse::<f64>()
                    .map(ColumnDefault::Float)
                    .unwrap_or_else(|_| ColumnDefault::Text(n.clone())),
            }),
            _ => None,
        };

        Ok(Some(literal.unwrap_or_else(|| {
            ColumnDefault::Text(expression_text(&self.source[first.start..last.end]))
        })))
    }

    /// `( expr )`, returning the text between the outer parentheses.
    fn parse_paren_expr(&mut self) -> Result<String, SqlParseError> {
        let open = match self.tokens.get(self.pos) {
            Some(s) if s.token == Token::LParen => s.end,
            _ => return Err(self.unexpected("'('")),
        };
        self.advance();

        let mut depth = 1usize;
        loop {
            match self.tokens.get(self.pos) {
                None => return Err(self.unexpected("')'")),
                Some(s) if s.token == Token::LParen => depth += 1,
                Some(s) if s.token == Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        let close = s.start;
                        self.advance();
                        return Ok(self.source[open..close].trim().to_string());
                    }
                }
                Some(_) => {}
            }
            self.advance();
        }
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        self.expect(Token::LParen, "'('")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.expect_ident("column name")?);
            match self.current() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    return Ok(columns);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn parse_reference(&mut self) -> Result<ForeignKeyRef, SqlParseError> {
        let table = self.parse_qualified_name("referenced table")?;
        let columns = if *self.current() == Token::LParen {
            self.parse_column_list()?
        } else {
            Vec::new()
        };

        let mut reference = ForeignKeyRef {
            table,
            columns,
            on_update: ReferenceOption::NoAction,
            on_delete: ReferenceOption::NoAction,
        };

        loop {
            match self.current() {
                Token::On => {
                    self.advance();
                    let is_update = match self.current() {
                        Token::Update => true,
                        Token::Delete => false,
                        _ => return Err(self.unexpected("UPDATE or DELETE")),
                    };
                    self.advance();
                    let action = self.parse_reference_action()?;
                    if is_update {
                        reference.on_update = action;
                    } else {
                        reference.on_delete = action;
                    }
                }
                tok if tok.is_word("match") => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(reference)
    }

    fn parse_reference_action(&mut self) -> Result<ReferenceOption, SqlParseError> {
        let action = match self.current() {
            Token::Cascade => ReferenceOption::Cascade,
            Token::Restrict => ReferenceOption::Restrict,
            Token::Set => {
                self.advance();
                match self.current() {
                    Token::Null => ReferenceOption::SetNull,
                    Token::Default => ReferenceOption::SetDefault,
                    _ => return Err(self.unexpected("NULL or DEFAULT")),
                }
            }
            Token::No => {
                self.advance();
                if *self.current() != Token::Action {
                    return Err(self.unexpected("ACTION"));
                }
                ReferenceOption::NoAction
            }
            _ => return Err(self.unexpected("referential action")),
        };
        self.advance();
        Ok(action)
    }

    fn parse_table_constraint(&mut self) -> Result<TableConstraint, SqlParseError> {
        let name = if *self.current() == Token::Constraint {
            self.advance();
            Some(self.expect_ident("constraint name")?)
        } else {
            None
        };

        let kind = match self.current() {
            Token::Primary => {
                self.advance();
                self.expect(Token::Key, "KEY")?;
                let columns = self.parse_column_list()?;
                self.skip_element();
                TableConstraintKind::PrimaryKey(columns)
            }
            Token::Unique => {
                self.advance();
                self.skip_nulls_distinct();
                let columns = self.parse_column_list()?;
                self.skip_element();
                TableConstraintKind::Unique(columns)
            }
            Token::Check => {
                self.advance();
                let detail = self.parse_paren_expr()?;
                self.skip_element();
                TableConstraintKind::Check(detail)
            }
            Token::Foreign => {
                self.advance();
                self.expect(Token::Key, "KEY")?;
                let columns = self.parse_column_list()?;
                self.expect(Token::References, "REFERENCES")?;
                let reference = self.parse_reference()?;
                self.skip_element();
                TableConstraintKind::ForeignKey { columns, reference }
            }
            _ => return Err(self.unexpected("PRIMARY KEY, UNIQUE, CHECK or FOREIGN KEY")),
        };
        Ok(TableConstraint { name, kind })
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<Statement, SqlParseError> {
        if self.current().is_word("concurrently") {
            self.advance();
        }
        self.skip_if_not_exists();

        let name = if *self.current() == Token::On {
            None
        } else {
            Some(self.parse_qualified_name("index name")?)
        };
        self.expect(Token::On, "ON")?;
        if *self.current() == Token::Only {
            self.advance();
        }
        let table = self.parse_qualified_name("table name")?;

        let method = if *self.current() == Token::Using {
            self.advance();
            Some(self.expect_ident("index method")?)
        } else {
            None
        };

        self.expect(Token::LParen, "'('")?;
        let mut columns = Vec::new();
        loop {
            // Expression elements have no column name and are left out.
            let is_plain_column = self.current().ident_text().is_some()
                && !matches!(self.peek_next(), Token::LParen | Token::Dot);
            if is_plain_column {
                columns.extend(self.current().ident_text());
            }
            self.skip_element();
            match self.current() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }

        Ok(Statement::CreateIndex(CreateIndex {
            name,
            table,
            unique,
            method,
            columns,
        }))
    }

    fn parse_create_type(&mut self) -> Result<Statement, SqlParseError> {
        let name = self.parse_qualified_name("type name")?;
        if *self.current() != Token::As || *self.peek_next() != Token::Enum {
            return Ok(Statement::Other);
        }
        self.advance();
        self.advance();
        self.expect(Token::LParen, "'('")?;

        let mut values = Vec::new();
        if *self.current() == Token::RParen {
            self.advance();
            return Ok(Statement::CreateEnum { name, values });
        }
        loop {
            match self.current() {
                Token::Str(value) => {
                    values.push(value.clone());
                    self.advance();
                }
                _ => return Err(self.unexpected("enum label")),
            }
            match self.current() {
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    return Ok(Statement::CreateEnum { name, values });
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn parse_comment(&mut self) -> Result<Statement, SqlParseError> {
        self.advance(); // COMMENT
        self.expect(Token::On, "ON")?;

        let target = match self.current() {
            Token::Table => {
                self.advance();
                let table = self.parse_qualified_name("table name")?;
                (table, None)
            }
            Token::Column => {
                self.advance();
                let mut parts = self.parse_name_parts("column name")?;
                let column = parts.pop();
                match (parts.pop(), column) {
                    (Some(table), Some(column)) => (table, Some(column)),
                    _ => return Err(self.unexpected("table.column")),
                }
            }
            _ => return Ok(Statement::Other),
        };

        self.expect(Token::Is, "IS")?;
        let comment = match self.current() {
            Token::Str(s) => Some(s.clone()),
            Token::Null => None,
            _ => return Err(self.unexpected("string or NULL")),
        };
        self.advance();

        Ok(Statement::Comment(match target {
            (table, None) => CommentOn::Table { table, comment },
            (table, Some(column)) => CommentOn::Column {
                table,
                column,
                comment,
            },
        }))
    }

    fn parse_alter_table(&mut self) -> Result<Statement, SqlParseError> {
        self.skip_if_exists();
        if *self.current() == Token::Only {
            self.advance();
        }
        let table = self.parse_qualified_name("table name")?;

        let mut commands = Vec::new();
        loop {
            let command = match self.current() {
                Token::Eof => return Err(self.unexpected("ALTER TABLE action")),
                Token::Add => {
                    self.advance();
                    match self.current() {
                        Token::Constraint
                        | Token::Primary
                        | Token::Unique
                        | Token::Check
                        | Token::Foreign => {
                            AlterCommand::AddConstraint(self.parse_table_constraint()?)
                        }
                        _ => {
                            if *self.current() == Token::Column {
                                self.advance();
                            }
                            self.skip_if_not_exists();
                            AlterCommand::AddColumn(self.parse_column_def()?)
                        }
                    }
                }
                _ => {
                    self.skip_element();
                    AlterCommand::Other
                }
            };
            commands.push(command);

            // NOT VALID and similar trailers
            self.skip_element();
            match self.current() {
                Token::Comma => self.advance(),
                Token::Eof => break,
                _ => return Err(self.unexpected("',' or end of statement")),
            }
        }

        Ok(Statement::AlterTable(AlterTable { table, commands }))
    }

    fn skip_nulls_distinct(&mut self) {
        if self.current().is_word("nulls") {
            self.advance();
            if *self.current() == Token::Not {
                self.advance();
            }
            self.advance(); // DISTINCT
        }
    }

    fn skip_no_inherit(&mut self) {
        if *self.current() == Token::No && self.peek_next().is_word("inherit") {
            self.advance();
            self.advance();
        }
    }

    /// Skip to the next `,` or `)` at the current nesting level.
    fn skip_element(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current() {
                Token::Eof => return,
                Token::LParen => depth += 1,
                Token::RParen if depth == 0 => return,
                Token::RParen => depth -= 1,
                Token::Comma if depth == 0 => return,
                _ => {}
            }
            self.advance();
        }
    }
}

/// SQL text of a non-literal default. Bare words that are not known SQL
/// value functions are parenthesized so they survive as expressions.
fn expression_text(raw: &str) -> String {
    let raw = raw.trim();
    if is_sql_expression(raw) {
        raw.to_string()
    } else {
        format!("({raw})")
    }
}

/// Whether a default string is SQL to render as-is rather than a literal.
pub fn is_sql_expression(text: &str) -> bool {
    const VALUE_FUNCTIONS: [&str; 8] = [
        "CURRENT_TIMESTAMP",
        "CURRENT_DATE",
        "CURRENT_TIME",
        "LOCALTIME",
        "LOCALTIMESTAMP",
        "CURRENT_USER",
        "SESSION_USER",
        "NULL",
    ];
    let text = text.trim();
    if VALUE_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(text)) {
        return true;
    }
    text.ends_with(')') && text.contains('(')
}
