//! Method-call parser for the Ruby subset `schema.rb` files are written in.
//!
//! A schema file is a list of calls (`create_table "users", id: false do
//! |t| ... end`). Anything that is not a call is skipped; a `do` block on a
//! constant receiver (`ActiveRecord::Schema.define(...) do`) is parsed
//! through so its body lands in the top-level list.

use super::lexer::{LexError, Lexer, Spanned, Token};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),
    #[error("Unexpected token: {found:?}, expected {expected}")]
    Unexpected {
        found: Token,
        expected: &'static str,
        offset: usize,
    },
}

impl ParseError {
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParseError::Lex(LexError::UnterminatedString(offset)) => Some(*offset),
            ParseError::Lex(_) => None,
            ParseError::Unexpected { offset, .. } => Some(*offset),
        }
    }
}

/// An argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Symbol(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Array(Vec<Value>),
    /// `-> { "now()" }`; the string when the body is a single literal
    Lambda(Option<String>),
    /// Hashes, constants and other expressions we do not interpret
    Other,
}

impl Value {
    /// The text of a string or symbol.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Strings of a string, symbol, or array of them.
    pub fn texts(&self) -> Vec<String> {
        match self {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_text)
                .map(str::to_string)
                .collect(),
            other => other.as_text().map(str::to_string).into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub receiver: Option<String>,
    pub name: String,
    pub args: Vec<Value>,
    pub options: Vec<(String, Value)>,
    pub block: Vec<Call>,
    pub offset: usize,
}

impl Call {
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn option_text(&self, key: &str) -> Option<&str> {
        self.option(key).and_then(Value::as_text)
    }

    pub fn option_is(&self, key: &str, expected: bool) -> bool {
        self.option(key) == Some(&Value::Bool(expected))
    }

    /// Positional string arguments, in order.
    pub fn strings(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter_map(|v| match v {
                Value::Str(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let (tokens, error) = Lexer::new(input).tokenize();
        Self {
            tokens,
            pos: 0,
            errors: error.map(ParseError::Lex).into_iter().collect(),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map_or(&Token::Eof, |s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |s| s.offset)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::Unexpected {
            found: self.peek().clone(),
            expected,
            offset: self.offset(),
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == Token::Newline {
            self.advance();
        }
    }

    /// Parse the whole file. Statements that fail to parse are recorded and
    /// skipped.
    pub fn parse(mut self) -> (Vec<Call>, Vec<ParseError>) {
        let calls = self.parse_body(false);
        (calls, self.errors)
    }

    /// Statements up to `end` (when `in_block`) or end of input.
    fn parse_body(&mut self, in_block: bool) -> Vec<Call> {
        let mut calls = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Token::Eof => break,
                tok if in_block && tok.is_ident("end") => {
                    self.advance();
                    break;
                }
                _ => {}
            }

            let start = self.pos;
            match self.parse_statement() {
                Ok(parsed) => calls.extend(parsed),
                Err(error) => {
                    self.errors.push(error);
                    if self.pos == start {
                        self.advance();
                    }
                    self.skip_statement();
                }
            }
        }
        calls
    }

    /// Skip to the end of the current line, including any `do ... end`
    /// block opened on it.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Newline if depth == 0 => return,
                tok if tok.is_ident("do") => depth += 1,
                tok if tok.is_ident("end") => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> Result<Vec<Call>, ParseError> {
        let offset = self.offset();
        let name = match self.peek() {
            Token::Ident(name) => name.clone(),
            _ => return Err(self.unexpected("method call")),
        };

        if name.starts_with(|c: char| c.is_uppercase()) {
            return Ok(self.parse_through());
        }
        self.advance();

        let (receiver, name) = if *self.peek() == Token::Dot {
            self.advance();
            match self.advance() {
                Token::Ident(method) => (Some(name), method),
                found => {
                    return Err(ParseError::Unexpected {
                        found,
                        expected: "method name",
                        offset: self.offset(),
                    });
                }
            }
        } else {
            (None, name)
        };

        let mut call = Call {
            receiver,
            name,
            args: Vec::new(),
            options: Vec::new(),
            block: Vec::new(),
            offset,
        };

        if *self.peek() == Token::LParen {
            self.advance();
            self.parse_arguments(&mut call, true)?;
            match self.advance() {
                Token::RParen => {}
                found => {
                    return Err(ParseError::Unexpected {
                        found,
                        expected: "')'",
                        offset: self.offset(),
                    });
                }
            }
        } else {
            self.parse_arguments(&mut call, false)?;
        }

        if self.peek().is_ident("do") {
            self.advance();
            self.skip_block_params();
            call.block = self.parse_body(true);
        }

        self.end_of_statement()?;
        Ok(vec![call])
    }

    /// `Foo::Bar[1].define(...) do ... end`: the receiver chain is
    /// ignored and the block's calls are returned in its place.
    fn parse_through(&mut self) -> Vec<Call> {
        loop {
            match self.peek() {
                Token::Eof | Token::Newline => return Vec::new(),
                tok if tok.is_ident("do") => {
                    self.advance();
                    self.skip_block_params();
                    return self.parse_body(true);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_block_params(&mut self) {
        if *self.peek() == Token::Pipe {
            self.advance();
            while !matches!(self.peek(), Token::Pipe | Token::Newline | Token::Eof) {
                self.advance();
            }
            if *self.peek() == Token::Pipe {
                self.advance();
            }
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Newline | Token::Eof => Ok(()),
            tok if tok.is_ident("end") => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn at_arguments_end(&self, in_parens: bool) -> bool {
        match self.peek() {
            Token::Eof => true,
            Token::RParen => in_parens,
            Token::Newline => !in_parens,
            tok => tok.is_ident("do") || tok.is_ident("end"),
        }
    }

    fn parse_arguments(&mut self, call: &mut Call, in_parens: bool) -> Result<(), ParseError> {
        loop {
            if in_parens {
                self.skip_newlines();
            }
            if self.at_arguments_end(in_parens) {
                return Ok(());
            }

            match self.peek().clone() {
                Token::Label(key) => {
                    self.advance();
                    self.skip_newlines();
                    let value = self.parse_value()?;
                    call.options.push((key, value));
                }
                // "key" => value
                _ if *self.peek_at(1) == Token::FatArrow => {
                    let key = self.parse_value()?;
                    self.advance();
                    let value = self.parse_value()?;
                    if let Some(key) = key.as_text() {
                        call.options.push((key.to_string(), value));
                    }
                }
                _ => {
                    let value = self.parse_value()?;
                    call.args.push(value);
                }
            }

            if *self.peek() == Token::Comma {
                self.advance();
                // a trailing comma continues on the next line
                self.skip_newlines();
            } else {
                return Ok(());
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let value = match self.advance() {
            Token::Str(s) => Value::Str(s),
            Token::Symbol(s) => Value::Symbol(s),
            Token::Int(n) => Value::Int(n),
            Token::Float(n) => Value::Float(n),
            Token::Ident(word) => match word.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "nil" => Value::Nil,
                _ => {
                    // Constants and method chains (`Float::INFINITY`, `Time.now`)
                    while matches!(self.peek(), Token::Scope | Token::Dot)
                        && matches!(self.peek_at(1), Token::Ident(_))
                    {
                        self.advance();
                        self.advance();
                    }
                    Value::Other
                }
            },
            Token::LBracket => {
                let mut items = Vec::new();
                loop {
                    self.skip_newlines();
                    if *self.peek() == Token::RBracket {
                        self.advance();
                        break;
                    }
                    items.push(self.parse_value()?);
                    self.skip_newlines();
                    match self.advance() {
                        Token::Comma => {}
                        Token::RBracket => break,
                        found => {
                            return Err(ParseError::Unexpected {
                                found,
                                expected: "',' or ']'",
                                offset: self.offset(),
                            });
                        }
                    }
                }
                Value::Array(items)
            }
            Token::Arrow => {
                if *self.peek() != Token::LBrace {
                    return Err(self.unexpected("'{'"));
                }
                self.advance();
                let body = self.skip_braced();
                match body.as_slice() {
                    [Token::Str(s)] => Value::Lambda(Some(s.clone())),
                    _ => Value::Lambda(None),
                }
            }
            Token::LBrace => {
                self.skip_braced();
                Value::Other
            }
            found => {
                return Err(ParseError::Unexpected {
                    found,
                    expected: "value",
                    offset: self.offset(),
                });
            }
        };
        Ok(value)
    }

    /// Consume up to the `}` closing an already consumed `{`, returning the
    /// tokens in between without newlines.
    fn skip_braced(&mut self) -> Vec<Token> {
        let mut depth = 1usize;
        let mut body = Vec::new();
        loop {
            let tok = self.advance();
            match tok {
                Token::Eof => return body,
                Token::LBrace => depth += 1,
                Token::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return body;
                    }
                }
                Token::Newline => continue,
                _ => {}
            }
            body.push(tok);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<Call> {
        let (calls, errors) = Parser::new(input).parse();
        assert!(errors.is_empty(), "{errors:?}");
        calls
    }

    #[test]
    fn test_define_block_is_transparent() {
        let calls = parse(
            "ActiveRecord::Schema[7.1].define(version: 2024_01_01_000000) do\n  enable_extension \"plpgsql\"\nend\n",
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "enable_extension");
        assert_eq!(calls[0].strings(), vec!["plpgsql"]);
    }

    #[test]
    fn test_create_table_block() {
        let calls = parse(
            r#"create_table "users", id: :uuid, force: :cascade, comment: "People" do |t|
  t.string "email", null: false, limit: 255
  t.datetime "created_at", default: -> { "CURRENT_TIMESTAMP" }
  t.index ["email"], name: "index_users_on_email", unique: true
end"#,
        );
        assert_eq!(calls.len(), 1);
        let create = &calls[0];
        assert_eq!(create.name, "create_table");
        assert_eq!(create.option_text("id"), Some("uuid"));
        assert_eq!(create.option_text("comment"), Some("People"));
        assert_eq!(create.block.len(), 3);

        let email = &create.block[0];
        assert_eq!(email.receiver.as_deref(), Some("t"));
        assert_eq!(email.name, "string");
        assert!(email.option_is("null", false));
        assert_eq!(email.option("limit"), Some(&Value::Int(255)));

        let created = &create.block[1];
        assert_eq!(
            created.option("default"),
            Some(&Value::Lambda(Some("CURRENT_TIMESTAMP".into())))
        );

        let index = &create.block[2];
        assert_eq!(index.args, vec![Value::Array(vec![Value::Str("email".into())])]);
        assert!(index.option_is("unique", true));
    }

    #[test]
    fn test_parenthesized_and_multiline_arguments() {
        let calls = parse(
            "add_foreign_key(\"posts\", \"users\",\n  column: :author_id, on_delete: :cascade)\n",
        );
        assert_eq!(calls[0].strings(), vec!["posts", "users"]);
        assert_eq!(calls[0].option_text("column"), Some("author_id"));
        assert_eq!(calls[0].option_text("on_delete"), Some("cascade"));
    }

    #[test]
    fn test_bad_statement_is_skipped() {
        let (calls, errors) = Parser::new(
            "create_table \"a\" do |t|\n  t.string \"x\" ]\nend\nenable_extension \"citext\"\n",
        )
        .parse();
        assert_eq!(errors.len(), 1);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].block.len(), 0);
        assert_eq!(calls[1].name, "enable_extension");
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let (_, errors) = Parser::new("create_table \"users").parse();
        assert_eq!(errors[0].offset(), Some(13));
    }
}
