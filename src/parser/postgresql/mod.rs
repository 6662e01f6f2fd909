//! PostgreSQL DDL front-end.
//!
//! The source is fed through [`process_in_chunks`]. Each chunk is lexed,
//! cut into statements at top-level semicolons, and every complete
//! statement is parsed and lowered. A statement cut off by the end of the
//! chunk is left for the next window.

mod converter;
pub mod lexer;
pub mod parser;

use std::mem;

use tracing::{trace, warn};

use self::converter::{ConvertState, Fragment};
pub use self::lexer::{LexError, Lexer, Spanned, Token};
pub use self::parser::{SqlParseError, Statement, parse_statement};
use super::chunks::{ChunkOutcome, process_in_chunks};
use super::{ProcessError, ProcessResult};

/// Parse PostgreSQL DDL into the canonical schema.
pub fn parse(input: &str, chunk_size: usize) -> ProcessResult {
    let mut state = ConvertState::default();
    let fatal = process_in_chunks(input, chunk_size, |chunk, offset| {
        let at_end = offset + chunk.len() >= input.len();
        read_chunk(&mut state, chunk, offset, at_end)
    });

    let ConvertState { schema, mut errors } = state;
    errors.extend(fatal);
    ProcessResult {
        value: schema,
        errors,
    }
}

/// A statement's tokens and its byte range in the chunk, including the
/// terminating semicolon when there is one.
#[derive(Debug)]
struct RawStatement {
    tokens: Vec<Spanned>,
    start: usize,
    end: usize,
}

#[derive(Debug)]
struct Split {
    statements: Vec<RawStatement>,
    /// Start of a statement the chunk cuts off.
    incomplete_at: Option<usize>,
}

fn split_statements(chunk: &str, at_end: bool) -> Split {
    let (tokens, lex_error) = Lexer::new(chunk).tokenize_partial();

    let mut statements = Vec::new();
    let mut current: Vec<Spanned> = Vec::new();
    for spanned in tokens {
        if spanned.token == Token::Semicolon {
            if let Some(first) = current.first() {
                statements.push(RawStatement {
                    start: first.start,
                    end: spanned.end,
                    tokens: mem::take(&mut current),
                });
            }
        } else {
            current.push(spanned);
        }
    }

    let tail_start = current.first().map(|s| s.start);
    let incomplete_at = match (lex_error, tail_start) {
        // An unterminated string or comment swallows the rest of the chunk.
        (Some(error), Some(tail)) => Some(tail.min(error.offset())),
        (Some(error), None) => Some(error.offset()),
        (None, Some(tail)) if !at_end => Some(tail),
        (None, Some(tail)) => {
            let end = current.last().map_or(tail, |s| s.end);
            statements.push(RawStatement {
                tokens: current,
                start: tail,
                end,
            });
            None
        }
        (None, None) => None,
    };

    Split {
        statements,
        incomplete_at,
    }
}

fn read_chunk(state: &mut ConvertState, chunk: &str, offset: usize, at_end: bool) -> ChunkOutcome {
    let Split {
        statements,
        incomplete_at,
    } = split_statements(chunk, at_end);

    let Some(incomplete) = incomplete_at else {
        convert(state, &statements, chunk, offset);
        return ChunkOutcome::complete();
    };

    match chunk[..incomplete].rfind('\n') {
        Some(newline) => {
            // Consume whole lines before the cut-off statement; it is read
            // again from the start of its line next time.
            let line_start = newline + 1;
            let complete: Vec<RawStatement> = statements
                .into_iter()
                .filter(|s| s.end < line_start)
                .collect();
            convert(state, &complete, chunk, offset);
            ChunkOutcome::read_up_to(newline)
        }
        None if at_end => {
            convert(state, &statements, chunk, offset);
            state.errors.push(unterminated(offset + incomplete));
            ChunkOutcome::complete()
        }
        None => {
            trace!(offset = offset + incomplete, "statement continues past chunk");
            ChunkOutcome::retry_at(incomplete, vec![unterminated(offset + incomplete)])
        }
    }
}

fn unterminated(offset: usize) -> ProcessError {
    ProcessError::UnexpectedTokenWarning {
        message: "unterminated statement at end of input".to_string(),
        offset: Some(offset),
    }
}

fn convert(state: &mut ConvertState, statements: &[RawStatement], chunk: &str, offset: usize) {
    let fragments = statements.iter().flat_map(|raw| {
        match parse_statement(&raw.tokens, chunk) {
            Ok(statement) => converter::lower(statement),
            Err(error) => {
                let at = offset + error.offset().unwrap_or(raw.start);
                warn!(%error, offset = at, "skipping statement");
                vec![Fragment::Warning(ProcessError::UnexpectedTokenWarning {
                    message: error.to_string(),
                    offset: Some(at),
                })]
            }
        }
    });
    *state = fragments.fold(mem::take(state), ConvertState::absorb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDefault;

    const USERS: &str = "CREATE TABLE users (id bigint PRIMARY KEY, email varchar(255) NOT NULL);\n\
                         COMMENT ON TABLE users IS 'User table';";

    #[test]
    fn test_users_table() {
        let result = parse(USERS, 500);
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let users = &result.value.tables["users"];
        assert_eq!(users.columns.len(), 2);
        assert!(users.columns["id"].primary);
        assert!(users.columns["email"].not_null);
        assert_eq!(users.comment.as_deref(), Some("User table"));
    }

    #[test]
    fn test_split_keeps_incomplete_tail() {
        let split = split_statements("SELECT 1;\nCREATE TABLE t (", false);
        assert_eq!(split.statements.len(), 1);
        assert_eq!(split.incomplete_at, Some(10));

        let split = split_statements("SELECT 1;\nSELECT 2", true);
        assert_eq!(split.statements.len(), 2);
        assert_eq!(split.incomplete_at, None);
    }

    #[test]
    fn test_split_ignores_semicolons_in_bodies() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql;\n\
                   COMMENT ON TABLE t IS 'a;b';";
        let split = split_statements(sql, true);
        assert_eq!(split.statements.len(), 2);
    }

    #[test]
    fn test_unterminated_string_in_chunk_is_retried() {
        let split = split_statements("SELECT 1;\nSELECT 'abc", false);
        assert_eq!(split.statements.len(), 1);
        assert_eq!(split.incomplete_at, Some(10));
    }

    #[test]
    fn test_long_statement_with_small_chunks() {
        let sql = "CREATE TABLE posts (\n  id bigint PRIMARY KEY,\n  title text NOT NULL,\n  body text,\n  published boolean DEFAULT false\n);";
        let result = parse(sql, 3);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let posts = &result.value.tables["posts"];
        assert_eq!(posts.columns.len(), 4);
        assert_eq!(
            posts.columns["published"].default,
            Some(ColumnDefault::Boolean(false))
        );
    }

    #[test]
    fn test_syntax_error_is_a_warning() {
        let sql = "CREATE TABLE a (id int PRIMARY);\nCREATE TABLE b (id int);";
        let result = parse(sql, 500);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].name(), "UnexpectedTokenWarningError");
        assert_eq!(result.errors[0].location(), Some(30));
        assert!(result.value.tables.contains_key("b"));
        assert!(!result.value.tables.contains_key("a"));
    }

    #[test]
    fn test_missing_final_semicolon() {
        let result = parse("CREATE TABLE a (id int)\n", 500);
        assert!(result.errors.is_empty());
        assert!(result.value.tables.contains_key("a"));
    }

    #[test]
    fn test_multibyte_comments_keep_offsets() {
        let sql = "-- ユーザー\nCREATE TABLE a (id int PRIMARY);";
        let result = parse(sql, 1);
        assert_eq!(result.errors.len(), 1);
        // "-- ユーザー\n" is 16 bytes; the error sits on ")" 30 bytes later.
        assert_eq!(result.errors[0].location(), Some(46));
    }
}
