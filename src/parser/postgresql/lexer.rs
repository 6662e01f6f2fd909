//! PostgreSQL lexer. Every token carries its byte span so statements can be
//! cut out of a chunk and raw expressions sliced back out of the source.

use thiserror::Error;

/// SQL token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Alter,
    Add,
    Table,
    Only,
    Primary,
    Key,
    Foreign,
    References,
    Not,
    Null,
    Unique,
    Default,
    On,
    Delete,
    Update,
    Cascade,
    Restrict,
    Set,
    No,
    Action,
    Constraint,
    Index,
    If,
    Exists,
    Check,
    Comment,
    Is,
    Column,
    Extension,
    Type,
    As,
    Enum,
    Using,
    True,
    False,
    Collate,
    Generated,

    // Identifiers and literals
    /// Unquoted identifier, folded to lower case
    Ident(String),
    QuotedIdent(String),
    Str(String),
    Num(String),

    // Symbols
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    DoubleColon,
    Op(char),

    // End of input
    Eof,
}

impl Token {
    /// Text of the token when used as an identifier. Keywords count, so
    /// columns named `key` or `comment` parse.
    pub fn ident_text(&self) -> Option<String> {
        match self {
            Token::Ident(s) | Token::QuotedIdent(s) => Some(s.clone()),
            other => other.keyword_text().map(str::to_lowercase),
        }
    }

    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    fn keyword_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Create => "CREATE",
            Token::Alter => "ALTER",
            Token::Add => "ADD",
            Token::Table => "TABLE",
            Token::Only => "ONLY",
            Token::Primary => "PRIMARY",
            Token::Key => "KEY",
            Token::Foreign => "FOREIGN",
            Token::References => "REFERENCES",
            Token::Not => "NOT",
            Token::Null => "NULL",
            Token::Unique => "UNIQUE",
            Token::Default => "DEFAULT",
            Token::On => "ON",
            Token::Delete => "DELETE",
            Token::Update => "UPDATE",
            Token::Cascade => "CASCADE",
            Token::Restrict => "RESTRICT",
            Token::Set => "SET",
            Token::No => "NO",
            Token::Action => "ACTION",
            Token::Constraint => "CONSTRAINT",
            Token::Index => "INDEX",
            Token::If => "IF",
            Token::Exists => "EXISTS",
            Token::Check => "CHECK",
            Token::Comment => "COMMENT",
            Token::Is => "IS",
            Token::Column => "COLUMN",
            Token::Extension => "EXTENSION",
            Token::Type => "TYPE",
            Token::As => "AS",
            Token::Enum => "ENUM",
            Token::Using => "USING",
            Token::True => "TRUE",
            Token::False => "FALSE",
            Token::Collate => "COLLATE",
            Token::Generated => "GENERATED",
            _ => return None,
        };
        Some(text)
    }
}

/// A token and its byte span in the lexed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            LexError::Unterminated { offset, .. } => *offset,
        }
    }
}

/// SQL lexer.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.current_char() {
            self.advance();
            if c == '\n' {
                break;
            }
        }
    }

    /// Block comments nest in PostgreSQL.
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.advance(); // /
        self.advance(); // *
        let mut depth = 1;
        while depth > 0 {
            match (self.current_char(), self.peek()) {
                (None, _) => {
                    return Err(LexError::Unterminated {
                        what: "block comment",
                        offset: start,
                    });
                }
                (Some('*'), Some('/')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                (Some('/'), Some('*')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                _ => self.advance(),
            }
        }
        Ok(())
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while self
            .current_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    /// Read a quoted run where the quote character is escaped by doubling.
    fn read_quoted(&mut self, quote: char, what: &'static str) -> Result<String, LexError> {
        let start = self.pos;
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current_char() {
                None => return Err(LexError::Unterminated { what, offset: start }),
                Some(c) if c == quote => {
                    self.advance();
                    if self.current_char() == Some(quote) {
                        s.push(quote);
                        self.advance();
                    } else {
                        return Ok(s);
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    /// `E'...'` strings honour backslash escapes.
    fn read_escape_string(&mut self) -> Result<String, LexError> {
        let start = self.pos;
        self.advance(); // E
        self.advance(); // '
        let mut s = String::new();
        loop {
            match self.current_char() {
                None => {
                    return Err(LexError::Unterminated {
                        what: "string",
                        offset: start,
                    });
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.current_char() {
                        match escaped {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            _ => s.push(escaped),
                        }
                        self.advance();
                    }
                }
                Some('\'') => {
                    self.advance();
                    if self.current_char() == Some('\'') {
                        s.push('\'');
                        self.advance();
                    } else {
                        return Ok(s);
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    /// `$tag$ ... $tag$`. Returns `None` when the `$` does not open a
    /// dollar quote (positional parameters like `$1`).
    fn read_dollar_quoted(&mut self) -> Option<Result<String, LexError>> {
        let start = self.pos;
        let rest = &self.input[start..];
        let tag_len = rest[1..]
            .char_indices()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
            .map(|(i, _)| i)?;
        if !rest[1 + tag_len..].starts_with('$') {
            return None;
        }
        let tag = &rest[1..1 + tag_len];
        if tag.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let delimiter = &rest[..tag_len + 2];
        let body_start = start + delimiter.len();
        match self.input[body_start..].find(delimiter) {
            Some(len) => {
                let body = self.input[body_start..body_start + len].to_string();
                self.pos = body_start + len + delimiter.len();
                Some(Ok(body))
            }
            None => Some(Err(LexError::Unterminated {
                what: "dollar-quoted string",
                offset: start,
            })),
        }
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        if self.current_char() == Some('-') {
            self.advance();
        }
        let mut has_dot = false;
        while let Some(c) = self.current_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !has_dot && self.peek().is_some_and(|n| n.is_ascii_digit()) {
                has_dot = true;
                self.advance();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek()
                    .is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+')
            {
                self.advance();
                self.advance();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn keyword_or_ident(&self, s: &str) -> Token {
        match s.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "ALTER" => Token::Alter,
            "ADD" => Token::Add,
            "TABLE" => Token::Table,
            "ONLY" => Token::Only,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "NOT" => Token::Not,
            "NULL" => Token::Null,
            "UNIQUE" => Token::Unique,
            "DEFAULT" => Token::Default,
            "ON" => Token::On,
            "DELETE" => Token::Delete,
            "UPDATE" => Token::Update,
            "CASCADE" => Token::Cascade,
            "RESTRICT" => Token::Restrict,
            "SET" => Token::Set,
            "NO" => Token::No,
            "ACTION" => Token::Action,
            "CONSTRAINT" => Token::Constraint,
            "INDEX" => Token::Index,
            "IF" => Token::If,
            "EXISTS" => Token::Exists,
            "CHECK" => Token::Check,
            "COMMENT" => Token::Comment,
            "IS" => Token::Is,
            "COLUMN" => Token::Column,
            "EXTENSION" => Token::Extension,
            "TYPE" => Token::Type,
            "AS" => Token::As,
            "ENUM" => Token::Enum,
            "USING" => Token::Using,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "COLLATE" => Token::Collate,
            "GENERATED" => Token::Generated,
            _ => Token::Ident(s.to_lowercase()),
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, LexError> {
        loop {
            self.skip_whitespace();
            let start = self.pos;

            let token = match self.current_char() {
                None => Token::Eof,

                Some('-') if self.peek() == Some('-') => {
                    self.skip_line_comment();
                    continue;
                }
                Some('-') if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    Token::Num(self.read_number())
                }
                Some('/') if self.peek() == Some('*') => {
                    self.skip_block_comment()?;
                    continue;
                }

                Some('(') => {
                    self.advance();
                    Token::LParen
                }
                Some(')') => {
                    self.advance();
                    Token::RParen
                }
                Some('[') => {
                    self.advance();
                    Token::LBracket
                }
                Some(']') => {
                    self.advance();
                    Token::RBracket
                }
                Some(',') => {
                    self.advance();
                    Token::Comma
                }
                Some(';') => {
                    self.advance();
                    Token::Semicolon
                }
                Some('.') if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    Token::Num(self.read_number())
                }
                Some('.') => {
                    self.advance();
                    Token::Dot
                }
                Some(':') if self.peek() == Some(':') => {
                    self.advance();
                    self.advance();
                    Token::DoubleColon
                }

                Some('"') => Token::QuotedIdent(self.read_quoted('"', "quoted identifier")?),
                Some('\'') => Token::Str(self.read_quoted('\'', "string")?),
                Some('e' | 'E') if self.peek() == Some('\'') => Token::Str(self.read_escape_string()?),
                Some('$') => match self.read_dollar_quoted() {
                    Some(body) => Token::Str(body?),
                    None => {
                        self.advance();
                        Token::Op('$')
                    }
                },

                Some(c) if c.is_ascii_digit() => Token::Num(self.read_number()),

                Some(c) if c.is_alphabetic() || c == '_' => {
                    let ident = self.read_identifier();
                    self.keyword_or_ident(&ident)
                }

                Some(c) => {
                    self.advance();
                    Token::Op(c)
                }
            };

            return Ok(Spanned {
                token,
                start,
                end: self.pos,
            });
        }
    }

    /// Collect tokens up to the end of input or the first lexing failure.
    /// The failure is returned alongside everything lexed before it. The
    /// token list never contains `Eof`.
    pub fn tokenize_partial(mut self) -> (Vec<Spanned>, Option<LexError>) {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Ok(Spanned {
                    token: Token::Eof, ..
                }) => return (tokens, None),
                Ok(spanned) => tokens.push(spanned),
                Err(e) => return (tokens, Some(e)),
            }
        }
    }

    /// Collect all tokens.
    pub fn tokenize(self) -> Result<Vec<Spanned>, LexError> {
        match self.tokenize_partial() {
            (tokens, None) => Ok(tokens),
            (_, Some(e)) => Err(e),
        }
    }
}
