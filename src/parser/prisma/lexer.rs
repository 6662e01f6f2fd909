use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(String),
    /// `/// text`, attached to the next model, enum or field
    DocComment(String),

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Eq,
    At,
    AtAt,
    Dot,
    Question,

    Eof,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character {ch:?} at byte {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("Unterminated string starting at byte {0}")]
    UnterminatedString(usize),
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            Self::UnexpectedChar { offset, .. } | Self::UnterminatedString(offset) => *offset,
        }
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    /// Consume while `pred` holds and return the text from `start`.
    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        while self.chars.next_if(|&(_, c)| pred(c)).is_some() {}
        let end = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);
        &self.input[start..end]
    }

    fn read_string(&mut self, start: usize) -> Result<String, LexError> {
        let mut s = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return Ok(s),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    Some((_, escaped)) => s.push(escaped),
                    None => break,
                },
                c => s.push(c),
            }
        }
        Err(LexError::UnterminatedString(start))
    }

    /// Skip whitespace and `//` comments. A `///` comment is returned as a
    /// token.
    fn skip_trivia(&mut self) -> Result<Option<Spanned>, LexError> {
        loop {
            while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
            let Some(&(start, '/')) = self.chars.peek() else {
                return Ok(None);
            };
            self.chars.next();
            if !self.bump_if('/') {
                return Err(LexError::UnexpectedChar { ch: '/', offset: start });
            }
            let doc = self.bump_if('/');
            let line = self.take_while(start, |c| c != '\n');
            if doc {
                return Ok(Some(Spanned {
                    token: Token::DocComment(line[3..].trim().to_string()),
                    offset: start,
                }));
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Spanned, LexError> {
        if let Some(doc) = self.skip_trivia()? {
            return Ok(doc);
        }

        let Some((offset, c)) = self.chars.next() else {
            return Ok(Spanned {
                token: Token::Eof,
                offset: self.input.len(),
            });
        };

        let token = match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '=' => Token::Eq,
            '.' => Token::Dot,
            '?' => Token::Question,
            '@' if self.bump_if('@') => Token::AtAt,
            '@' => Token::At,
            '"' => Token::Str(self.read_string(offset)?),
            '-' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                let text = self.take_while(offset, |c| c.is_ascii_digit() || c == '.');
                Token::Num(text.to_string())
            }
            c if c.is_ascii_digit() => {
                let text = self.take_while(offset, |c| c.is_ascii_digit() || c == '.');
                Token::Num(text.to_string())
            }
            c if c.is_alphabetic() || c == '_' => {
                let text = self.take_while(offset, |c| c.is_alphanumeric() || c == '_');
                Token::Ident(text.to_string())
            }
            ch => return Err(LexError::UnexpectedChar { ch, offset }),
        };

        Ok(Spanned { token, offset })
    }

    /// All tokens, ending with [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }
}
