use schemapatch::parser::{Format, ParseOptions, ProcessResult};

/// No statement spans more than two lines, so even a one-line window can
/// grow far enough to hold each of them.
const DDL: &str = "-- users and their posts
CREATE TABLE users (id bigint PRIMARY KEY,
  name text NOT NULL);
COMMENT ON TABLE users IS 'ユーザー; 全員';
CREATE TABLE posts (id bigint PRIMARY KEY, user_id bigint,
  title varchar(120) DEFAULT 'untitled');

ALTER TABLE posts ADD CONSTRAINT posts_user_fk
  FOREIGN KEY (user_id) REFERENCES users (id);
CREATE INDEX posts_title_idx ON posts (title);
CREATE TABLE broken (id int PRIMARY);
COMMENT ON COLUMN posts.title IS 'Headline';";

fn parse(sql: &str, chunk_size: usize) -> ProcessResult {
    Format::Postgres.parse(sql, &ParseOptions::default().with_chunk_size(chunk_size))
}

#[test]
fn test_chunk_size_invariance() {
    let reference = parse(DDL, 500);
    assert_eq!(reference.value.tables.len(), 2);
    assert_eq!(reference.errors.len(), 1, "{:?}", reference.errors);
    assert_eq!(reference.errors[0].name(), "UnexpectedTokenWarningError");

    for chunk_size in [1, 3] {
        let result = parse(DDL, chunk_size);
        assert_eq!(result.value, reference.value, "chunk size {chunk_size}");
        assert_eq!(result.errors, reference.errors, "chunk size {chunk_size}");
    }
}

#[test]
fn test_statement_longer_than_chunk() {
    let sql = "CREATE TABLE events (
  id bigint PRIMARY KEY,
  kind text NOT NULL,
  payload jsonb,
  occurred_at timestamptz DEFAULT now()
);";
    let result = parse(sql, 3);
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let events = &result.value.tables["events"];
    assert_eq!(
        events.columns.keys().collect::<Vec<_>>(),
        ["id", "kind", "payload", "occurred_at"]
    );
    assert!(events.columns["id"].primary);
}

#[test]
fn test_statement_beyond_growth_limit_stops_parsing() {
    let sql = "CREATE TABLE wide (\n  a int,\n  b int,\n  c int,\n  d int\n);\nCREATE TABLE after (id int);";
    let result = parse(sql, 2);
    assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
    assert_eq!(result.errors[0].location(), Some(0));
    assert!(!result.errors[0].is_fatal());
    assert_eq!(result.errors[1].name(), "ChunkWindowExhaustedError");
    assert!(result.errors[1].is_fatal());
    // Parsing stopped, so the table after the oversized statement is lost too.
    assert!(result.value.tables.is_empty());
}
