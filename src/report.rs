//! Plain-text schema summary for terminals.
//!
//! Columns are aligned by display width so names in wide scripts line up
//! with ASCII ones.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::operation::{get_change_status, ChangeStatus, Operation, PathPattern};
use crate::schema::{ColumnDefault, Constraint, Schema, Table};

pub struct SummaryStyle {
    pub indent: usize,
    pub gap: usize,
    pub max_default_width: usize,
}

impl Default for SummaryStyle {
    fn default() -> Self {
        Self {
            indent: 2,
            gap: 2,
            max_default_width: 32,
        }
    }
}

impl SummaryStyle {
    pub fn text_width(&self, text: &str) -> usize {
        UnicodeWidthStr::width(text)
    }

    /// Pad `text` with spaces to `width` display columns.
    fn pad(&self, text: &str, width: usize) -> String {
        let fill = width.saturating_sub(self.text_width(text));
        format!("{text}{}", " ".repeat(fill))
    }

    /// Cut `text` to at most `width` display columns, marking the cut.
    fn truncate(&self, text: &str, width: usize) -> String {
        if self.text_width(text) <= width {
            return text.to_string();
        }
        let mut out = String::new();
        let mut used = 0;
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            if used + w + 1 > width {
                break;
            }
            used += w;
            out.push(c);
        }
        out.push('…');
        out
    }

    /// Summary of `schema`. When `operations` is given every table and
    /// column line is prefixed with its change marker.
    pub fn render(&self, schema: &Schema, operations: Option<&[Operation]>) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} tables, {} relationships, {} enums, {} extensions\n",
            schema.tables.len(),
            schema.relationships.len(),
            schema.enums.len(),
            schema.extensions.len()
        ));

        for table in schema.tables.values() {
            out.push('\n');
            self.render_table(&mut out, table, operations);
        }

        if !schema.enums.is_empty() {
            out.push('\n');
            for block in schema.enums.values() {
                out.push_str(&format!("enum {} ({})\n", block.name, block.values.join(", ")));
            }
        }
        if !schema.extensions.is_empty() {
            let names: Vec<&str> = schema.extensions.keys().map(String::as_str).collect();
            out.push_str(&format!("\nextensions: {}\n", names.join(", ")));
        }
        out
    }

    fn render_table(&self, out: &mut String, table: &Table, operations: Option<&[Operation]>) {
        let marker = |pattern, item: Option<&str>| match operations {
            Some(ops) => format!("{} ", status_marker(get_change_status(&table.name, ops, pattern, item))),
            None => String::new(),
        };

        out.push_str(&marker(PathPattern::TableBase, None));
        out.push_str(&table.name);
        if let Some(comment) = &table.comment {
            out.push_str(&format!("  -- {comment}"));
        }
        out.push('\n');

        let foreign: Vec<&str> = table
            .constraints
            .values()
            .filter(|c| matches!(c, Constraint::ForeignKey { .. }))
            .flat_map(|c| c.column_names().iter().map(String::as_str))
            .collect();

        let rows: Vec<[String; 4]> = table
            .columns
            .values()
            .map(|column| {
                let mut flags = Vec::new();
                if column.primary {
                    flags.push("PK");
                }
                if foreign.contains(&column.name.as_str()) {
                    flags.push("FK");
                }
                if column.not_null && !column.primary {
                    flags.push("NOT NULL");
                }
                if column.unique && !column.primary {
                    flags.push("UNIQUE");
                }
                let default = column
                    .default
                    .as_ref()
                    .map(|d| format!("= {}", self.truncate(&default_text(d), self.max_default_width)))
                    .unwrap_or_default();
                [column.name.clone(), column.typ.clone(), flags.join(" "), default]
            })
            .collect();

        let widths: Vec<usize> = (0..4)
            .map(|i| rows.iter().map(|r| self.text_width(&r[i])).max().unwrap_or(0))
            .collect();

        let indent = " ".repeat(self.indent);
        let gap = " ".repeat(self.gap);
        for row in &rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| self.pad(cell, width))
                .collect();
            let line = format!(
                "{indent}{}{}",
                marker(PathPattern::ColumnBase, Some(row[0].as_str())),
                cells.join(&gap)
            );
            out.push_str(line.trim_end());
            out.push('\n');
        }

        for index in table.indexes.values() {
            let unique = if index.unique { "unique " } else { "" };
            out.push_str(&format!(
                "{indent}{unique}index {} ({})\n",
                index.name,
                index.columns.join(", ")
            ));
        }
    }
}

fn status_marker(status: ChangeStatus) -> char {
    match status {
        ChangeStatus::Added => '+',
        ChangeStatus::Removed => '-',
        ChangeStatus::Modified => '~',
        ChangeStatus::Unchanged => ' ',
    }
}

fn default_text(default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::Boolean(b) => b.to_string(),
        ColumnDefault::Integer(n) => n.to_string(),
        ColumnDefault::Float(f) => f.to_string(),
        ColumnDefault::Text(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use serde_json::json;

    fn sample() -> Schema {
        let mut schema = Schema::default();
        let mut users = Table::new("users")
            .with_column(Column::new("id", "bigint").primary())
            .with_column(Column::new("ユーザー名", "text").not_null());
        users.comment = Some("User table".into());
        users.add_constraint(Constraint::PrimaryKey {
            name: "PRIMARY_id".into(),
            column_names: vec!["id".into()],
        });
        schema.add_table(users);
        schema
    }

    #[test]
    fn test_unicode_width() {
        let style = SummaryStyle::default();
        assert_eq!(style.text_width("ユーザー"), 8);
        assert_eq!(style.text_width("Userテスト"), 10);
    }

    #[test]
    fn test_columns_align_by_display_width() {
        let text = SummaryStyle::default().render(&sample(), None);
        assert_eq!(
            text,
            "1 tables, 0 relationships, 0 enums, 0 extensions\n\
             \n\
             users  -- User table\n\
             \x20 id          bigint  PK\n\
             \x20 ユーザー名  text    NOT NULL\n"
        );
    }

    #[test]
    fn test_change_markers() {
        let ops = [Operation::add(
            "/tables/users/columns/id",
            json!({"name": "id", "type": "bigint"}),
        )];
        let text = SummaryStyle::default().render(&sample(), Some(&ops[..]));
        assert!(text.contains("\n  users  -- User table\n"));
        assert!(text.contains("  + id"));
        assert!(text.contains("    ユーザー名"));
    }

    #[test]
    fn test_truncate_long_default() {
        let style = SummaryStyle {
            max_default_width: 6,
            ..SummaryStyle::default()
        };
        assert_eq!(style.truncate("now()", 6), "now()");
        assert_eq!(style.truncate("gen_random_uuid()", 6), "gen_r…");
    }
}
