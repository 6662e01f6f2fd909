//! Version history of an edited schema.
//!
//! Only the initial snapshot and the ordered forward patches are trusted.
//! The current content is always rebuilt by replaying every stored patch
//! over the snapshot, and each new version carries the reverse patch that
//! undoes it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{apply_patch_operations, compare, ApplyError, Operation};

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Version conflict: The schema has been modified since you last loaded it")]
    Conflict { expected: u32, actual: u32 },
    #[error("failed to replay version {number}: {source}")]
    Replay {
        number: u32,
        #[source]
        source: ApplyError,
    },
    #[error("failed to apply new patch: {0}")]
    Apply(#[source] ApplyError),
    #[error("no version to undo")]
    NothingToUndo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub number: u32,
    pub patch: Vec<Operation>,
    pub reverse_patch: Vec<Operation>,
}

/// A version ready to be committed: the patched content plus the record
/// to store.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedVersion {
    pub content: Value,
    pub record: VersionRecord,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistory {
    pub initial_snapshot: Value,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

impl VersionHistory {
    pub fn new(initial_snapshot: Value) -> Self {
        Self {
            initial_snapshot,
            versions: Vec::new(),
        }
    }

    /// Highest stored version number, 0 when nothing has been committed.
    pub fn latest_number(&self) -> u32 {
        self.versions.iter().map(|v| v.number).max().unwrap_or(0)
    }

    /// Content after replaying every version numbered `number` or lower.
    pub fn content_at(&self, number: u32) -> Result<Value, VersionError> {
        let mut versions: Vec<&VersionRecord> =
            self.versions.iter().filter(|v| v.number <= number).collect();
        versions.sort_by_key(|v| v.number);

        // Full replay on every call, no cached intermediate content.
        versions
            .into_iter()
            .try_fold(self.initial_snapshot.clone(), |content, version| {
                debug!(number = version.number, "replaying version");
                apply_patch_operations(&content, &version.patch).map_err(|source| {
                    VersionError::Replay {
                        number: version.number,
                        source,
                    }
                })
            })
    }

    pub fn latest_content(&self) -> Result<Value, VersionError> {
        self.content_at(self.latest_number())
    }

    /// Apply `patch` on top of version `expected_latest` and compute its
    /// reverse patch. Fails with a conflict when another version was stored
    /// after `expected_latest`.
    pub fn prepare_version(
        &self,
        expected_latest: u32,
        patch: Vec<Operation>,
    ) -> Result<PreparedVersion, VersionError> {
        let current = self.content_at(expected_latest)?;
        let content = apply_patch_operations(&current, &patch).map_err(VersionError::Apply)?;
        let reverse_patch = compare(&content, &current);

        let actual = self.latest_number();
        if expected_latest != actual {
            return Err(VersionError::Conflict {
                expected: expected_latest,
                actual,
            });
        }

        debug!(
            number = actual + 1,
            operations = patch.len(),
            reverse = reverse_patch.len(),
            "prepared version"
        );
        Ok(PreparedVersion {
            content,
            record: VersionRecord {
                number: actual + 1,
                patch,
                reverse_patch,
            },
        })
    }

    /// Store a prepared version. A version prepared against an older
    /// history is rejected as a conflict.
    pub fn commit(&mut self, prepared: PreparedVersion) -> Result<Value, VersionError> {
        let actual = self.latest_number();
        if prepared.record.number != actual + 1 {
            return Err(VersionError::Conflict {
                expected: prepared.record.number.saturating_sub(1),
                actual,
            });
        }
        self.versions.push(prepared.record);
        Ok(prepared.content)
    }

    /// Drop the latest version, returning the content it reverts to.
    pub fn undo_latest(&mut self) -> Result<Value, VersionError> {
        let latest = self.latest_content()?;
        let position = self
            .versions
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| v.number)
            .map(|(i, _)| i)
            .ok_or(VersionError::NothingToUndo)?;
        let record = &self.versions[position];
        let reverted = apply_patch_operations(&latest, &record.reverse_patch).map_err(|source| {
            VersionError::Replay {
                number: record.number,
                source,
            }
        })?;
        self.versions.remove(position);
        Ok(reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history() -> VersionHistory {
        VersionHistory::new(json!({"tables": {}}))
    }

    #[test]
    fn test_prepare_and_commit() {
        let mut history = history();
        assert_eq!(history.latest_number(), 0);

        let prepared = history
            .prepare_version(0, vec![Operation::add("/tables/users", json!({"name": "users"}))])
            .unwrap();
        assert_eq!(prepared.record.number, 1);
        assert_eq!(
            prepared.record.reverse_patch,
            vec![Operation::remove("/tables/users")]
        );
        history.commit(prepared).unwrap();

        assert_eq!(history.latest_number(), 1);
        assert_eq!(
            history.latest_content().unwrap(),
            json!({"tables": {"users": {"name": "users"}}})
        );
        assert_eq!(history.content_at(0).unwrap(), json!({"tables": {}}));
    }

    #[test]
    fn test_conflict() {
        let mut history = history();
        let first = history
            .prepare_version(0, vec![Operation::add("/tables/a", json!({}))])
            .unwrap();
        let stale = history
            .prepare_version(0, vec![Operation::add("/tables/b", json!({}))])
            .unwrap();
        history.commit(first).unwrap();

        let err = history.commit(stale).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Version conflict: The schema has been modified since you last loaded it"
        );

        let err = history
            .prepare_version(0, vec![Operation::add("/tables/c", json!({}))])
            .unwrap_err();
        assert!(matches!(err, VersionError::Conflict { expected: 0, actual: 1 }));
    }

    #[test]
    fn test_bad_patch_is_rejected() {
        let history = history();
        let err = history
            .prepare_version(0, vec![Operation::remove("/tables/missing")])
            .unwrap_err();
        assert!(matches!(err, VersionError::Apply(_)));
    }

    #[test]
    fn test_undo_latest() {
        let mut history = history();
        for (i, name) in ["a", "b"].iter().enumerate() {
            let prepared = history
                .prepare_version(
                    i as u32,
                    vec![Operation::add(format!("/tables/{name}"), json!({"name": name}))],
                )
                .unwrap();
            history.commit(prepared).unwrap();
        }

        let reverted = history.undo_latest().unwrap();
        assert_eq!(reverted, json!({"tables": {"a": {"name": "a"}}}));
        assert_eq!(history.latest_number(), 1);
        assert_eq!(history.latest_content().unwrap(), reverted);

        history.undo_latest().unwrap();
        assert!(matches!(
            history.undo_latest(),
            Err(VersionError::NothingToUndo)
        ));
    }
}
