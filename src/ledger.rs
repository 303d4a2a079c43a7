use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::MigrationError;
use crate::providers::ApiResponse;

type IdMap = BTreeMap<String, u64>;

/// What [`Ledger::track`] did for one `(category, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Created(u64),
    Skipped(u64),
}

/// Persistent record of what has already been created on the target,
/// keyed by category and source id. Entries are written once and never
/// overwritten.
pub struct Ledger {
    path: PathBuf,
    paranoid: bool,
    entries: BTreeMap<String, IdMap>,
}

impl Ledger {
    /// Load the ledger at `path`, or start (and write) an empty one.
    /// With `paranoid` set, every mark is flushed immediately.
    pub fn open(path: &Path, paranoid: bool) -> Result<Self> {
        let existed = path.is_file();
        let mut ledger = Self::load(path)?;
        ledger.paranoid = paranoid;
        if existed {
            tracing::info!(path = %path.display(), entries = ledger.len(), "resuming from ledger");
        } else {
            ledger.flush()?;
        }
        Ok(ledger)
    }

    /// Read the ledger at `path` without creating it. A missing file reads
    /// as an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.is_file() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read ledger {}", path.display()))?;
            parse(path, &contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            paranoid: false,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|m| m.len()).sum()
    }

    pub fn is_done(&self, category: &str, id: &str) -> bool {
        self.github_id(category, id).is_some()
    }

    pub fn github_id(&self, category: &str, id: &str) -> Option<u64> {
        self.entries
            .get(category)
            .and_then(|m| m.get(id))
            .copied()
            .filter(|v| *v > 0)
    }

    /// Like [`Ledger::github_id`] for dependencies that pipeline ordering
    /// guarantees are already migrated.
    pub fn github_id_or_fail(&self, category: &str, id: &str) -> Result<u64, MigrationError> {
        self.github_id(category, id)
            .ok_or_else(|| MigrationError::ReferenceResolution {
                category: category.to_string(),
                source_id: id.to_string(),
            })
    }

    /// Source ids recorded under `category`, in key order.
    pub fn source_ids(&self, category: &str) -> Vec<&str> {
        self.entries
            .get(category)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn mark_done(&mut self, category: &str, id: &str, remote_id: u64) -> Result<()> {
        if let Some(existing) = self.github_id(category, id) {
            return Err(MigrationError::DuplicateMark {
                category: category.to_string(),
                source_id: id.to_string(),
                existing,
                new: remote_id,
            }
            .into());
        }
        if remote_id == 0 {
            return Err(MigrationError::MalformedResponse {
                category: category.to_string(),
                source_id: id.to_string(),
                field: "id".into(),
                body: remote_id.to_string(),
            }
            .into());
        }

        self.entries
            .entry(category.to_string())
            .or_default()
            .insert(id.to_string(), remote_id);

        if self.paranoid {
            self.flush()?;
        }
        Ok(())
    }

    /// The idempotency gate: run `create` only if `(category, id)` is not
    /// done yet, then record the `id` of the response, plus each field in
    /// `extra_fields` under `category.field`. A failed attempt records
    /// nothing.
    pub async fn track<F, Fut>(
        &mut self,
        category: &str,
        id: &str,
        extra_fields: &[&str],
        create: F,
    ) -> Result<TrackOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ApiResponse>>,
    {
        if let Some(existing) = self.github_id(category, id) {
            tracing::debug!(category, id, "nothing to do");
            return Ok(TrackOutcome::Skipped(existing));
        }

        tracing::info!(category, id, "creating");
        match self.record(category, id, extra_fields, create).await {
            Ok(remote_id) => Ok(TrackOutcome::Created(remote_id)),
            Err(e) => {
                tracing::error!(category, id, error = %e, "failed to create on target");
                Err(e)
            }
        }
    }

    async fn record<F, Fut>(
        &mut self,
        category: &str,
        id: &str,
        extra_fields: &[&str],
        create: F,
    ) -> Result<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ApiResponse>>,
    {
        let response = create().await?;

        if !response.is_success() {
            return Err(MigrationError::RemoteCreate {
                category: category.to_string(),
                source_id: id.to_string(),
                status: response.status,
                body: response.body.to_string(),
            }
            .into());
        }

        // Validate every field before marking anything, so a malformed
        // response leaves no partial trace.
        let primary = identity_field(&response.body, category, id, "id")?;
        let extras = extra_fields
            .iter()
            .map(|field| Ok((*field, identity_field(&response.body, category, id, field)?)))
            .collect::<Result<Vec<_>, MigrationError>>()?;

        self.mark_done(category, id, primary)?;
        for (field, value) in extras {
            self.mark_done(&format!("{category}.{field}"), id, value)?;
        }
        Ok(primary)
    }

    /// Write the whole ledger to disk, replacing the previous file.
    pub fn flush(&self) -> Result<()> {
        tracing::debug!(path = %self.path.display(), "flushing ledger");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace ledger {}", self.path.display()))?;
        Ok(())
    }
}

fn identity_field(body: &Value, category: &str, id: &str, field: &str) -> Result<u64, MigrationError> {
    body.get(field)
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
        .ok_or_else(|| MigrationError::MalformedResponse {
            category: category.to_string(),
            source_id: id.to_string(),
            field: field.to_string(),
            body: body.to_string(),
        })
}

/// Parse and validate the on-disk shape: category -> source id -> positive integer.
fn parse(path: &Path, contents: &str) -> Result<BTreeMap<String, IdMap>, MigrationError> {
    let malformed = |reason: String| MigrationError::MalformedLedger {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value =
        serde_json::from_str(contents.trim()).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    let top = match value {
        Value::Object(top) => top,
        other => return Err(malformed(format!("expected an object at top level, got {other}"))),
    };

    let mut entries = BTreeMap::new();
    for (category, subtree) in top {
        let ids = match subtree {
            Value::Object(ids) => ids,
            other => {
                return Err(malformed(format!("{category} should be an object of ids, got {other}")))
            }
        };
        let mut map = IdMap::new();
        for (id, remote) in ids {
            match remote.as_u64().filter(|v| *v > 0) {
                Some(v) => {
                    map.insert(id, v);
                }
                None => {
                    return Err(malformed(format!(
                        "{category}.{id} should be a positive integer, got {remote}"
                    )))
                }
            }
        }
        entries.insert(category, map);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn ledger_in(dir: &tempfile::TempDir) -> Ledger {
        Ledger::open(&dir.path().join("progress.json"), false).unwrap()
    }

    fn ok(body: Value) -> Result<ApiResponse> {
        Ok(ApiResponse { status: 201, body })
    }

    #[test]
    fn open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let ledger = Ledger::open(&path, false).unwrap();
        assert_eq!(ledger.len(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn load_reads_without_creating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let empty = Ledger::load(&path).unwrap();
        assert_eq!(empty.len(), 0);
        assert!(!path.exists());

        std::fs::write(&path, r#"{"cards": {"c1": 5}}"#).unwrap();
        let ledger = Ledger::load(&path).unwrap();
        assert_eq!(ledger.github_id("cards", "c1"), Some(5));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"cards": {"c1": 5}}"#);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut ledger = Ledger::open(&path, false).unwrap();
        ledger.mark_done("lists", "a", 1).unwrap();
        ledger.mark_done("lists", "b", 2).unwrap();
        ledger.flush().unwrap();

        let reloaded = Ledger::open(&path, false).unwrap();
        assert_eq!(reloaded.entries, ledger.entries);
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({"lists": {"a": 1, "b": 2}}));
    }

    #[test]
    fn is_done_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        assert!(!ledger.is_done("cards", "c1"));
        assert_eq!(ledger.github_id("cards", "c1"), None);

        ledger.mark_done("cards", "c1", 77).unwrap();
        assert!(ledger.is_done("cards", "c1"));
        assert_eq!(ledger.github_id("cards", "c1"), Some(77));
        assert!(!ledger.is_done("cards.number", "c1"));
        assert_eq!(ledger.source_ids("cards"), vec!["c1"]);
    }

    #[test]
    fn github_id_or_fail_reports_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        let err = ledger.github_id_or_fail("lists", "l9").unwrap_err();
        assert!(matches!(err, MigrationError::ReferenceResolution { .. }));
        assert!(err.to_string().contains("lists.l9"));
    }

    #[test]
    fn marking_twice_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        ledger.mark_done("lists", "a", 1).unwrap();
        let err = ledger.mark_done("lists", "a", 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::DuplicateMark { existing: 1, new: 2, .. })
        ));
        assert_eq!(ledger.github_id("lists", "a"), Some(1));
    }

    #[test]
    fn paranoid_mode_flushes_every_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut ledger = Ledger::open(&path, true).unwrap();
        ledger.mark_done("labels", "x", 5).unwrap();
        let reloaded = Ledger::open(&path, false).unwrap();
        assert_eq!(reloaded.github_id("labels", "x"), Some(5));
    }

    #[test]
    fn rejects_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        for bad in [
            "[]",
            r#"{"lists": [1, 2]}"#,
            r#"{"lists": {"a": "1"}}"#,
            r#"{"lists": {"a": 0}}"#,
            r#"{"lists": {"a": -3}}"#,
            r#"{"lists": {"a": 1.5}}"#,
            "not json",
        ] {
            std::fs::write(&path, bad).unwrap();
            let err = Ledger::open(&path, false).err().unwrap();
            assert!(
                matches!(
                    err.downcast_ref::<MigrationError>(),
                    Some(MigrationError::MalformedLedger { .. })
                ),
                "expected malformed ledger for {bad}"
            );
        }
    }

    #[tokio::test]
    async fn track_calls_creator_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let calls = Cell::new(0);

        let first = ledger
            .track("lists", "a", &[], || async {
                calls.set(calls.get() + 1);
                ok(json!({"id": 10}))
            })
            .await
            .unwrap();
        let second = ledger
            .track("lists", "a", &[], || async {
                calls.set(calls.get() + 1);
                ok(json!({"id": 11}))
            })
            .await
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, TrackOutcome::Created(10));
        assert_eq!(second, TrackOutcome::Skipped(10));
        assert_eq!(ledger.github_id("lists", "a"), Some(10));
    }

    #[tokio::test]
    async fn track_records_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        ledger
            .track("cards", "c1", &["number"], || async {
                ok(json!({"id": 9001, "number": 7}))
            })
            .await
            .unwrap();
        assert_eq!(ledger.github_id("cards", "c1"), Some(9001));
        assert_eq!(ledger.github_id("cards.number", "c1"), Some(7));
    }

    #[tokio::test]
    async fn non_2xx_is_a_remote_create_error_and_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let err = ledger
            .track("labels", "x", &[], || async {
                Ok(ApiResponse {
                    status: 422,
                    body: json!({"message": "already_exists"}),
                })
            })
            .await
            .unwrap_err();
        match err.downcast_ref::<MigrationError>() {
            Some(MigrationError::RemoteCreate { status, body, .. }) => {
                assert_eq!(*status, 422);
                assert!(body.contains("already_exists"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!ledger.is_done("labels", "x"));
    }

    #[tokio::test]
    async fn missing_identity_is_malformed_and_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let err = ledger
            .track("cards", "c1", &["number"], || async { ok(json!({"id": 5})) })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MigrationError>(),
            Some(MigrationError::MalformedResponse { field, .. }) if field == "number"
        ));
        assert!(!ledger.is_done("cards", "c1"));
        assert!(!ledger.is_done("cards.number", "c1"));

        let err = ledger
            .track("lists", "l1", &[], || async { ok(json!({"id": "12"})) })
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<MigrationError>().is_some());
    }

    #[tokio::test]
    async fn transport_errors_propagate_and_allow_retry() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        let result = ledger
            .track("lists", "a", &[], || async { Err(anyhow::anyhow!("connection reset")) })
            .await;
        assert!(result.unwrap_err().to_string().contains("connection reset"));

        let retried = ledger
            .track("lists", "a", &[], || async { ok(json!({"id": 3})) })
            .await
            .unwrap();
        assert_eq!(retried, TrackOutcome::Created(3));
    }
}
