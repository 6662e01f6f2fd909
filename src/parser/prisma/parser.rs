use super::ast::*;
use super::lexer::{LexError, Lexer, Spanned, Token};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),
    #[error("Unexpected token {found:?} at byte {offset}, expected {expected}")]
    Unexpected {
        found: Token,
        expected: &'static str,
        offset: usize,
    },
    #[error("Unexpected end of input")]
    UnexpectedEof { offset: usize },
}

impl ParseError {
    /// Byte offset into the schema source.
    pub fn offset(&self) -> usize {
        match self {
            Self::Lex(e) => e.offset(),
            Self::Unexpected { offset, .. } | Self::UnexpectedEof { offset } => *offset,
        }
    }

    fn at(found: &Spanned, expected: &'static str) -> Self {
        match &found.token {
            Token::Eof => Self::UnexpectedEof {
                offset: found.offset,
            },
            token => Self::Unexpected {
                found: token.clone(),
                expected,
                offset: found.offset,
            },
        }
    }
}

const BLOCK_KEYWORDS: [&str; 6] = ["model", "enum", "datasource", "generator", "type", "view"];

static EOF: Spanned = Spanned {
    token: Token::Eof,
    offset: 0,
};

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self { tokens, pos: 0 })
    }

    /// The token under the cursor. Past the end this stays on the final
    /// `Eof`, which carries the input length as its offset.
    fn current(&self) -> &Spanned {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .unwrap_or(&EOF)
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|s| &s.token)
    }

    fn advance(&mut self) -> Spanned {
        let spanned = self.current().clone();
        self.pos += 1;
        spanned
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        let next = self.advance();
        match next.token {
            Token::Ident(s) => Ok(s),
            _ => Err(ParseError::at(&next, "identifier")),
        }
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        let next = self.advance();
        if next.token == expected {
            Ok(())
        } else {
            Err(ParseError::at(&next, what))
        }
    }

    fn check_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == name)
    }

    fn take_doc(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        while let Token::DocComment(line) = self.peek() {
            lines.push(line.clone());
            self.advance();
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// Parse every block. A block that fails to parse is skipped and its
    /// error collected; the rest of the document still comes through.
    pub fn parse(&mut self) -> (Document, Vec<ParseError>) {
        let mut document = Document::default();
        let mut errors = Vec::new();

        loop {
            let doc = self.take_doc();
            if *self.peek() == Token::Eof {
                break;
            }
            let result = if self.check_ident("model") {
                self.advance();
                self.parse_model(doc).map(|m| document.models.push(m))
            } else if self.check_ident("enum") {
                self.advance();
                self.parse_enum(doc).map(|e| document.enums.push(e))
            } else if BLOCK_KEYWORDS[2..].iter().any(|k| self.check_ident(k)) {
                self.advance();
                self.skip_block()
            } else {
                Err(ParseError::at(
                    self.current(),
                    "model, enum, datasource or generator",
                ))
            };

            if let Err(error) = result {
                errors.push(error);
                self.recover();
            }
        }

        (document, errors)
    }

    /// Skip to the next block keyword that follows a `}` or a doc comment.
    fn recover(&mut self) {
        loop {
            if *self.peek() == Token::Eof {
                return;
            }
            let after_block = self.pos > 0
                && matches!(
                    self.tokens.get(self.pos - 1).map(|s| &s.token),
                    Some(Token::RBrace | Token::DocComment(_))
                );
            if after_block && BLOCK_KEYWORDS.iter().any(|k| self.check_ident(k)) {
                return;
            }
            self.advance();
        }
    }

    fn skip_block(&mut self) -> Result<(), ParseError> {
        self.expect_ident()?;
        self.expect(Token::LBrace, "'{'")?;
        let mut depth = 1;
        while depth > 0 {
            let next = self.advance();
            match next.token {
                Token::LBrace => depth += 1,
                Token::RBrace => depth -= 1,
                Token::Eof => return Err(ParseError::at(&next, "'}'")),
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_model(&mut self, doc: Option<String>) -> Result<Model, ParseError> {
        let name = self.expect_ident()?;
        self.expect(Token::LBrace, "'{'")?;

        let mut fields = Vec::new();
        let mut attributes = Vec::new();

        loop {
            let field_doc = self.take_doc();
            match self.peek() {
                Token::RBrace => break,
                Token::AtAt => {
                    self.advance();
                    attributes.push(self.parse_attribute()?);
                }
                _ => fields.push(self.parse_field(field_doc)?),
            }
        }

        self.expect(Token::RBrace, "'}'")?;

        Ok(Model {
            name,
            fields,
            attributes,
            doc,
        })
    }

    fn parse_field(&mut self, doc: Option<String>) -> Result<Field, ParseError> {
        let name = self.expect_ident()?;
        let mut typ = self.expect_ident()?;

        // Unsupported("circle")
        if *self.peek() == Token::LParen {
            self.advance();
            if let Token::Str(s) = self.advance().token {
                typ = s;
            }
            self.expect(Token::RParen, "')'")?;
        }

        let arity = match self.peek() {
            Token::Question => {
                self.advance();
                Arity::Optional
            }
            Token::LBracket => {
                self.advance();
                self.expect(Token::RBracket, "']'")?;
                Arity::List
            }
            _ => Arity::Required,
        };

        let mut attributes = Vec::new();
        while *self.peek() == Token::At {
            self.advance();
            attributes.push(self.parse_attribute()?);
        }

        Ok(Field {
            name,
            typ,
            arity,
            attributes,
            doc,
        })
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let mut name = self.expect_ident()?;
        while *self.peek() == Token::Dot {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }

        let args = if *self.peek() == Token::LParen {
            self.advance();
            self.parse_args()?
        } else {
            Vec::new()
        };

        Ok(Attribute { name, args })
    }

    /// Arguments after an already consumed `(`, through the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        loop {
            if *self.peek() == Token::RParen {
                self.advance();
                return Ok(args);
            }

            let name = match (self.peek(), self.peek_second()) {
                (Token::Ident(s), Some(Token::Colon)) => {
                    let s = s.clone();
                    self.advance();
                    self.advance();
                    Some(s)
                }
                _ => None,
            };
            let value = self.parse_expr()?;
            args.push(Arg { name, value });

            let next = self.advance();
            match next.token {
                Token::Comma => {}
                Token::RParen => return Ok(args),
                _ => return Err(ParseError::at(&next, "',' or ')'")),
            }
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let next = self.advance();
        match next.token {
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Num(n) => Ok(Expr::Num(n)),
            Token::Ident(s) => {
                if *self.peek() == Token::LParen {
                    self.advance();
                    Ok(Expr::Call(s, self.parse_args()?))
                } else {
                    Ok(Expr::Ident(s))
                }
            }
            Token::LBracket => {
                let mut items = Vec::new();
                loop {
                    if *self.peek() == Token::RBracket {
                        self.advance();
                        return Ok(Expr::Array(items));
                    }
                    items.push(self.parse_expr()?);
                    let next = self.advance();
                    match next.token {
                        Token::Comma => {}
                        Token::RBracket => return Ok(Expr::Array(items)),
                        _ => return Err(ParseError::at(&next, "',' or ']'")),
                    }
                }
            }
            _ => Err(ParseError::at(&next, "value")),
        }
    }

    fn parse_enum(&mut self, doc: Option<String>) -> Result<EnumBlock, ParseError> {
        let name = self.expect_ident()?;
        self.expect(Token::LBrace, "'{'")?;

        let mut values = Vec::new();
        let mut mapped_name = None;

        loop {
            self.take_doc();
            let next = self.current().clone();
            match next.token {
                Token::RBrace => break,
                Token::AtAt => {
                    self.advance();
                    let attribute = self.parse_attribute()?;
                    if attribute.name == "map" {
                        mapped_name = attribute.str_arg(None).map(str::to_string);
                    }
                }
                Token::Ident(value) => {
                    self.advance();
                    // `@map("db_value")` renames the stored label
                    let mut stored = value;
                    while *self.peek() == Token::At {
                        self.advance();
                        let attribute = self.parse_attribute()?;
                        if attribute.name == "map" {
                            if let Some(mapped) = attribute.str_arg(None) {
                                stored = mapped.to_string();
                            }
                        }
                    }
                    values.push(stored);
                }
                _ => return Err(ParseError::at(&next, "enum value")),
            }
        }

        self.expect(Token::RBrace, "'}'")?;

        Ok(EnumBlock {
            name,
            values,
            mapped_name,
            doc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Document {
        let (document, errors) = Parser::new(input).unwrap().parse();
        assert!(errors.is_empty(), "{errors:?}");
        document
    }

    #[test]
    fn test_parse_model() {
        let input = r#"
            datasource db {
              provider = "postgresql"
              url      = env("DATABASE_URL")
            }

            /// A registered user
            model User {
              id    Int     @id @default(autoincrement())
              email String  @unique @db.VarChar(255)
              posts Post[]
              @@map("users")
            }
        "#;
        let document = parse(input);
        assert_eq!(document.models.len(), 1);

        let user = &document.models[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.doc.as_deref(), Some("A registered user"));
        assert_eq!(user.table_name(), "users");
        assert_eq!(user.fields.len(), 3);
        assert_eq!(user.fields[2].arity, Arity::List);

        let id = &user.fields[0];
        assert_eq!(
            id.attribute("default").and_then(|a| a.arg(None)),
            Some(&Expr::Call("autoincrement".into(), vec![]))
        );
        let email = &user.fields[1];
        assert_eq!(email.attribute("db.VarChar").map(|a| a.args.len()), Some(1));
    }

    #[test]
    fn test_parse_relation() {
        let input = r#"
            model Post {
              id       Int   @id
              authorId Int?
              author   User? @relation(fields: [authorId], references: [id], onDelete: Cascade)
              @@index([authorId], map: "post_author_idx")
            }
        "#;
        let document = parse(input);
        let post = &document.models[0];
        let relation = post.fields[2].attribute("relation").unwrap();
        assert_eq!(relation.ident_list(Some("fields")), vec!["authorId"]);
        assert_eq!(relation.arg(Some("onDelete")), Some(&Expr::Ident("Cascade".into())));
        assert_eq!(post.attributes[0].ident_list(None), vec!["authorId"]);
        assert_eq!(post.attributes[0].str_arg(Some("map")), Some("post_author_idx"));
    }

    #[test]
    fn test_parse_enum() {
        let input = "enum Role {\n  USER\n  ADMIN @map(\"admin\")\n  @@map(\"role\")\n}";
        let document = parse(input);
        assert_eq!(document.enums[0].values, vec!["USER", "admin"]);
        assert_eq!(document.enums[0].mapped_name.as_deref(), Some("role"));
    }

    #[test]
    fn test_bad_block_is_skipped() {
        let input = "model A {\n  id Int @id(\n}\nmodel B {\n  id Int @id\n}";
        let (document, errors) = Parser::new(input).unwrap().parse();
        assert_eq!(errors.len(), 1);
        // the stray `}` closing the argument list of `@id(`
        assert_eq!(errors[0].offset(), 24);
        assert_eq!(document.models.len(), 1);
        assert_eq!(document.models[0].name, "B");
    }

    #[test]
    fn test_unclosed_block_reports_end_of_input() {
        let input = "model A {\n  id Int";
        let (document, errors) = Parser::new(input).unwrap().parse();
        assert!(document.models.is_empty());
        assert_eq!(
            errors,
            vec![ParseError::UnexpectedEof {
                offset: input.len()
            }]
        );
    }
}
