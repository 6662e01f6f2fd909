//! Classify how a patch touches one table, column, index or constraint.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::{Operation, OperationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

/// Structural path shapes a patch can address. Each pattern captures the
/// table name first and, for nested objects, the column, index or
/// constraint name second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    TableBase,
    TableName,
    TableComment,
    ColumnBase,
    ColumnName,
    ColumnType,
    ColumnDefault,
    ColumnCheck,
    ColumnPrimary,
    ColumnNotNull,
    ColumnUnique,
    ColumnComment,
    IndexBase,
    IndexName,
    IndexUnique,
    IndexColumns,
    IndexType,
    ConstraintBase,
    ConstraintName,
    ConstraintColumnNames,
    ConstraintDetail,
    ConstraintTargetTableName,
    ConstraintTargetColumnNames,
    ConstraintUpdateConstraint,
    ConstraintDeleteConstraint,
}

const SEGMENT: &str = "([^/]+)";

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    PathPattern::ALL
        .iter()
        .map(|p| {
            let pattern = format!("^/tables/{SEGMENT}{}$", p.suffix()).replace("{item}", SEGMENT);
            Regex::new(&pattern).expect("valid path pattern")
        })
        .collect()
});

impl PathPattern {
    /// In declaration order, so `ALL[p as usize] == p`.
    pub const ALL: [PathPattern; 25] = {
        use PathPattern::*;
        [
            TableBase,
            TableName,
            TableComment,
            ColumnBase,
            ColumnName,
            ColumnType,
            ColumnDefault,
            ColumnCheck,
            ColumnPrimary,
            ColumnNotNull,
            ColumnUnique,
            ColumnComment,
            IndexBase,
            IndexName,
            IndexUnique,
            IndexColumns,
            IndexType,
            ConstraintBase,
            ConstraintName,
            ConstraintColumnNames,
            ConstraintDetail,
            ConstraintTargetTableName,
            ConstraintTargetColumnNames,
            ConstraintUpdateConstraint,
            ConstraintDeleteConstraint,
        ]
    };

    fn suffix(self) -> &'static str {
        use PathPattern::*;
        match self {
            TableBase => "",
            TableName => "/name",
            TableComment => "/comment",
            ColumnBase => "/columns/{item}",
            ColumnName => "/columns/{item}/name",
            ColumnType => "/columns/{item}/type",
            ColumnDefault => "/columns/{item}/default",
            ColumnCheck => "/columns/{item}/check",
            ColumnPrimary => "/columns/{item}/primary",
            ColumnNotNull => "/columns/{item}/notNull",
            ColumnUnique => "/columns/{item}/unique",
            ColumnComment => "/columns/{item}/comment",
            IndexBase => "/indexes/{item}",
            IndexName => "/indexes/{item}/name",
            IndexUnique => "/indexes/{item}/unique",
            IndexColumns => "/indexes/{item}/columns",
            IndexType => "/indexes/{item}/type",
            ConstraintBase => "/constraints/{item}",
            ConstraintName => "/constraints/{item}/name",
            ConstraintColumnNames => "/constraints/{item}/columnNames",
            ConstraintDetail => "/constraints/{item}/detail",
            ConstraintTargetTableName => "/constraints/{item}/targetTableName",
            ConstraintTargetColumnNames => "/constraints/{item}/targetColumnNames",
            ConstraintUpdateConstraint => "/constraints/{item}/updateConstraint",
            ConstraintDeleteConstraint => "/constraints/{item}/deleteConstraint",
        }
    }

    /// Match `path`, returning the unescaped table name and, for nested
    /// patterns, the item name.
    pub fn captures(self, path: &str) -> Option<(String, Option<String>)> {
        let captures = PATTERNS.get(self as usize)?.captures(path)?;
        let unescape = |s: &str| s.replace("~1", "/").replace("~0", "~");
        let table = unescape(captures.get(1)?.as_str());
        let item = captures.get(2).map(|m| unescape(m.as_str()));
        Some((table, item))
    }
}

/// Status of `table_id` (and `item_id`, when given) under `pattern` after
/// `operations`.
pub fn get_change_status(
    table_id: &str,
    operations: &[Operation],
    pattern: PathPattern,
    item_id: Option<&str>,
) -> ChangeStatus {
    let matching = operations.iter().filter(|op| {
        pattern.captures(op.path()).is_some_and(|(table, item)| {
            table == table_id && item_id.is_none_or(|id| item.as_deref() == Some(id))
        })
    });

    let (mut added, mut removed, mut replaced) = (false, false, false);
    for op in matching {
        match op.kind() {
            OperationKind::Add => added = true,
            OperationKind::Remove => removed = true,
            OperationKind::Replace => replaced = true,
        }
    }

    match (added, removed, replaced) {
        (_, _, true) | (true, true, _) => ChangeStatus::Modified,
        (true, false, false) => ChangeStatus::Added,
        (false, true, false) => ChangeStatus::Removed,
        (false, false, false) => ChangeStatus::Unchanged,
    }
}
