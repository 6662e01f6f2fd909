use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// `name:` in keyword arguments
    Label(String),
    /// `:name` or `:"name"`
    Symbol(String),
    Str(String),
    Int(i64),
    Float(f64),

    LBrace,    // {
    RBrace,    // }
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Dot,       // .
    Scope,     // ::
    Arrow,     // ->
    FatArrow,  // =>
    Pipe,      // |
    Other(char),
    Newline,

    Eof,
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(s) if s == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Newlines are significant in Ruby and are kept as tokens.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some('\n') => break,
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('\\') => {
                    // line continuation
                    self.bump();
                    self.bump_if('\r');
                    self.bump_if('\n');
                }
                Some('#') => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        // predicate and bang methods
        if let Some(&c @ ('?' | '!')) = self.chars.peek() {
            s.push(c);
            self.bump();
        }
        s
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(s),
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        match c {
                            'n' if quote == '"' => s.push('\n'),
                            't' if quote == '"' => s.push('\t'),
                            'r' if quote == '"' => s.push('\r'),
                            c if c == quote || c == '\\' => s.push(c),
                            // single quotes keep unknown escapes verbatim
                            c if quote == '\'' => {
                                s.push('\\');
                                s.push(c);
                            }
                            c => s.push(c),
                        }
                    }
                }
                Some(c) => s.push(c),
                None => return Err(LexError::UnterminatedString(start)),
            }
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token, LexError> {
        let mut s = String::from(first);
        let mut is_float = false;
        loop {
            let mut lookahead = self.chars.clone();
            match lookahead.next() {
                Some(c) if c.is_ascii_digit() => s.push(c),
                // 2024_01_01
                Some('_') => {}
                Some('.') if !is_float && lookahead.next().is_some_and(|c| c.is_ascii_digit()) => {
                    is_float = true;
                    s.push('.');
                }
                _ => break,
            }
            self.bump();
        }
        if is_float {
            s.parse().map(Token::Float).map_err(|_| LexError::InvalidNumber(s))
        } else {
            s.parse().map(Token::Int).map_err(|_| LexError::InvalidNumber(s))
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, LexError> {
        self.skip_whitespace_and_comments();
        let offset = self.pos;

        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    offset,
                });
            }
        };

        let token = match c {
            '\n' => Token::Newline,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '|' => Token::Pipe,
            ':' => {
                if self.bump_if(':') {
                    Token::Scope
                } else {
                    match self.chars.peek().copied() {
                        Some(q @ ('"' | '\'')) => {
                            self.bump();
                            Token::Symbol(self.read_string(q, offset)?)
                        }
                        Some(c) if c.is_alphabetic() || c == '_' => {
                            self.bump();
                            Token::Symbol(self.read_ident(c))
                        }
                        _ => Token::Other(':'),
                    }
                }
            }
            '-' => {
                if self.bump_if('>') {
                    Token::Arrow
                } else if self.chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.read_number('-')?
                } else {
                    Token::Other('-')
                }
            }
            '=' => {
                if self.bump_if('>') {
                    Token::FatArrow
                } else {
                    Token::Other('=')
                }
            }
            q @ ('"' | '\'') => Token::Str(self.read_string(q, offset)?),
            c if c.is_ascii_digit() => self.read_number(c)?,
            c if c.is_alphabetic() || c == '_' => {
                let name = self.read_ident(c);
                // `null:` but not `Foo::Bar`
                let mut lookahead = self.chars.clone();
                if lookahead.next() == Some(':') && lookahead.next() != Some(':') {
                    self.bump();
                    Token::Label(name)
                } else {
                    Token::Ident(name)
                }
            }
            c => Token::Other(c),
        };

        Ok(Spanned { token, offset })
    }

    /// Tokens up to the first lexical error, ending with `Eof`.
    pub fn tokenize(mut self) -> (Vec<Spanned>, Option<LexError>) {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Ok(spanned) if spanned.token == Token::Eof => {
                    tokens.push(spanned);
                    return (tokens, None);
                }
                Ok(spanned) => tokens.push(spanned),
                Err(error) => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        offset: self.pos,
                    });
                    return (tokens, Some(error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let (tokens, error) = Lexer::new(input).tokenize();
        assert_eq!(error, None);
        tokens.into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_column_line() {
        assert_eq!(
            tokens("t.string \"name\", null: false, limit: 255"),
            vec![
                Token::Ident("t".into()),
                Token::Dot,
                Token::Ident("string".into()),
                Token::Str("name".into()),
                Token::Comma,
                Token::Label("null".into()),
                Token::Ident("false".into()),
                Token::Comma,
                Token::Label("limit".into()),
                Token::Int(255),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_predicate_and_bang_methods() {
        assert_eq!(
            tokens("exists?(:users) save! :admin?"),
            vec![
                Token::Ident("exists?".into()),
                Token::LParen,
                Token::Symbol("users".into()),
                Token::RParen,
                Token::Ident("save!".into()),
                Token::Symbol("admin?".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_symbols_and_scopes() {
        assert_eq!(
            tokens("ActiveRecord::Schema[7.1].define(version: 2024_01_31_000000) do |t| :uuid"),
            vec![
                Token::Ident("ActiveRecord".into()),
                Token::Scope,
                Token::Ident("Schema".into()),
                Token::LBracket,
                Token::Float(7.1),
                Token::RBracket,
                Token::Dot,
                Token::Ident("define".into()),
                Token::LParen,
                Token::Label("version".into()),
                Token::Int(20240131000000),
                Token::RParen,
                Token::Ident("do".into()),
                Token::Pipe,
                Token::Ident("t".into()),
                Token::Pipe,
                Token::Symbol("uuid".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_newlines() {
        assert_eq!(
            tokens("# header\nenable_extension \"plpgsql\" # trailing\n"),
            vec![
                Token::Newline,
                Token::Ident("enable_extension".into()),
                Token::Str("plpgsql".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lambda_default() {
        assert_eq!(
            tokens("default: -> { \"now()\" }"),
            vec![
                Token::Label("default".into()),
                Token::Arrow,
                Token::LBrace,
                Token::Str("now()".into()),
                Token::RBrace,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_numbers() {
        assert_eq!(
            tokens(r#"'it\'s' "a\"b" -1 1.5"#),
            vec![
                Token::Str("it's".into()),
                Token::Str("a\"b".into()),
                Token::Int(-1),
                Token::Float(1.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, error) = Lexer::new("create_table \"users").tokenize();
        assert_eq!(error, Some(LexError::UnterminatedString(13)));
        assert_eq!(tokens.last().map(|s| &s.token), Some(&Token::Eof));
    }
}
