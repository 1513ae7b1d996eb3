//! Provenance log
//!
//! Revision records live in a project-scoped opaque JSON blob, under
//! `revisionLog.records`. The blob is owned by the enclosing application and
//! reached through a [`ContextStore`]; other keys in it are preserved on every
//! write. Appends are read-modify-write, serialized per scope, and keep only
//! the newest `capacity` records.

use crate::types::RevisionRecord;
use async_trait::async_trait;
use cadence_ir::{ir_hash, ArtifactIr, HashError};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default number of records kept per scope
pub const MAX_RECORDS: usize = 200;

const LOG_KEY: &str = "revisionLog";
const RECORDS_KEY: &str = "records";

/// Provenance storage errors
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    #[error("context store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("revision record serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ir hash error: {0}")]
    Hash(#[from] HashError),
}

/// Stable hex digest of a document
///
/// # Errors
/// Returns error if the document cannot be serialized
pub fn compute_ir_hash(ir: &ArtifactIr) -> Result<String, ProvenanceError> {
    Ok(ir_hash(ir)?.to_string())
}

/// Read/write access to per-scope context blobs
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Raw blob for `scope`, if any
    async fn read(&self, scope: &str) -> Result<Option<String>, ProvenanceError>;

    /// Replace the blob for `scope`
    async fn write(&self, scope: &str, blob: String) -> Result<(), ProvenanceError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    blobs: DashMap<String, String>,
}

impl InMemoryContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current blob, bypassing the async interface
    #[must_use]
    pub fn raw(&self, scope: &str) -> Option<String> {
        self.blobs.get(scope).map(|blob| blob.value().clone())
    }

    /// Seed a blob
    pub fn set_raw(&self, scope: impl Into<String>, blob: impl Into<String>) {
        self.blobs.insert(scope.into(), blob.into());
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn read(&self, scope: &str) -> Result<Option<String>, ProvenanceError> {
        Ok(self.raw(scope))
    }

    async fn write(&self, scope: &str, blob: String) -> Result<(), ProvenanceError> {
        self.blobs.insert(scope.to_string(), blob);
        Ok(())
    }
}

/// One JSON file per scope under a root directory
#[derive(Debug, Clone)]
pub struct FsContextStore {
    root: PathBuf,
}

impl FsContextStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding `scope`'s blob
    ///
    /// ASCII letters, digits and `-` are kept; every other byte, `_`
    /// included, is written as `_xx` hex, so distinct scopes never share a
    /// file.
    #[must_use]
    pub fn path_for(&self, scope: &str) -> PathBuf {
        let mut name = String::with_capacity(scope.len());
        for byte in scope.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push('_');
                name.push_str(&hex::encode([byte]));
            }
        }
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl ContextStore for FsContextStore {
    async fn read(&self, scope: &str) -> Result<Option<String>, ProvenanceError> {
        match tokio::fs::read_to_string(self.path_for(scope)).await {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, scope: &str, blob: String) -> Result<(), ProvenanceError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(scope);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, blob).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }
}

/// Capped, append-only revision log over a [`ContextStore`]
pub struct ProvenanceLog {
    store: Arc<dyn ContextStore>,
    capacity: usize,
    /// Held only while an append is in flight; idle entries are removed
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProvenanceLog {
    /// Log keeping [`MAX_RECORDS`] per scope
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self::with_capacity(store, MAX_RECORDS)
    }

    /// Log keeping `capacity` records per scope
    pub fn with_capacity(store: Arc<dyn ContextStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            locks: DashMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn scope_lock(&self, scope: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append `record`, dropping the oldest entries beyond capacity
    ///
    /// # Errors
    /// Returns error if the store fails or the record cannot be serialized
    pub async fn append(&self, scope: &str, record: &RevisionRecord) -> Result<(), ProvenanceError> {
        let lock = self.scope_lock(scope);
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(scope, record).await
        };
        drop(lock);
        // Only the map's own handle left means nobody is waiting on this scope.
        self.locks.remove_if(scope, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn append_locked(&self, scope: &str, record: &RevisionRecord) -> Result<(), ProvenanceError> {
        let mut context = parse_context(self.store.read(scope).await?.as_deref(), scope);
        let mut log = match context.remove(LOG_KEY) {
            Some(Value::Object(log)) => log,
            _ => Map::new(),
        };

        let mut records = match log.remove(RECORDS_KEY) {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        };
        records.retain(|record| !record.is_null());
        records.push(serde_json::to_value(record)?);
        if records.len() > self.capacity {
            let overflow = records.len() - self.capacity;
            records.drain(..overflow);
        }
        let count = records.len();
        log.insert(RECORDS_KEY.to_string(), Value::Array(records));
        context.insert(LOG_KEY.to_string(), Value::Object(log));

        self.store
            .write(scope, Value::Object(context).to_string())
            .await?;
        debug!(scope, revision = %record.revision_id, records = count, "appended revision record");
        Ok(())
    }

    /// Records for `scope`, oldest first
    ///
    /// Entries that do not decode as records are skipped.
    ///
    /// # Errors
    /// Returns error if the store fails
    pub async fn read(&self, scope: &str) -> Result<Vec<RevisionRecord>, ProvenanceError> {
        let context = parse_context(self.store.read(scope).await?.as_deref(), scope);
        let records = match context.get(LOG_KEY).and_then(|log| log.get(RECORDS_KEY)) {
            Some(Value::Array(records)) => records,
            _ => return Ok(Vec::new()),
        };
        Ok(records
            .iter()
            .filter(|value| !value.is_null())
            .filter_map(|value| match serde_json::from_value(value.clone()) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(scope, error = %err, "skipping undecodable revision record");
                    None
                }
            })
            .collect())
    }
}

/// Blob as a JSON object; missing, corrupt or non-object blobs read as empty
fn parse_context(blob: Option<&str>, scope: &str) -> Map<String, Value> {
    let Some(blob) = blob.filter(|b| !b.trim().is_empty()) else {
        return Map::new();
    };
    match serde_json::from_str(blob) {
        Ok(Value::Object(map)) => map,
        _ => {
            warn!(scope, "context blob is not a JSON object, starting fresh");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordTarget, RevisionMode, ValidationOutcome};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(n: usize) -> RevisionRecord {
        RevisionRecord {
            revision_id: format!("rev_{n:04}"),
            timestamp: "2026-01-01T00:00:00+00:00".into(),
            mode: RevisionMode::Patch,
            target: RecordTarget::Artifact,
            instruction: format!("edit {n}"),
            provider: "mock".into(),
            model: None,
            patch_count: 0,
            validation: ValidationOutcome::Passed,
            heading_renames: None,
            errors: None,
            ir_hash_before: "x".into(),
            ir_hash_after: "x".into(),
        }
    }

    fn memory_log() -> (Arc<InMemoryContextStore>, ProvenanceLog) {
        let store = Arc::new(InMemoryContextStore::new());
        let log = ProvenanceLog::new(store.clone());
        (store, log)
    }

    #[tokio::test]
    async fn append_then_read() {
        let (_, log) = memory_log();
        log.append("p1", &record(1)).await.unwrap();
        log.append("p1", &record(2)).await.unwrap();
        let records = log.read("p1").await.unwrap();
        assert_eq!(records, vec![record(1), record(2)]);
        assert!(log.read("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cap_evicts_oldest_first() {
        let (_, log) = memory_log();
        for n in 1..=205 {
            log.append("p", &record(n)).await.unwrap();
        }
        let records = log.read("p").await.unwrap();
        assert_eq!(records.len(), MAX_RECORDS);
        assert_eq!(records[0].revision_id, "rev_0006");
        assert_eq!(records[199].revision_id, "rev_0205");
    }

    #[tokio::test]
    async fn unrelated_keys_survive() {
        let (store, log) = memory_log();
        store.set_raw("p", r#"{"persona": "analyst", "revisionLog": {"records": [], "note": 1}}"#);
        log.append("p", &record(1)).await.unwrap();
        let blob: Value = serde_json::from_str(&store.raw("p").unwrap()).unwrap();
        assert_eq!(blob["persona"], json!("analyst"));
        assert_eq!(blob["revisionLog"]["note"], json!(1));
        assert_eq!(blob["revisionLog"]["records"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_empty() {
        let (store, log) = memory_log();
        store.set_raw("p", "[1, 2, 3]");
        assert!(log.read("p").await.unwrap().is_empty());
        store.set_raw("p", "{broken");
        log.append("p", &record(1)).await.unwrap();
        assert_eq!(log.read("p").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let (store, log) = memory_log();
        store.set_raw("p", r#"{"revisionLog": {"records": [null, {"bogus": true}]}}"#);
        log.append("p", &record(7)).await.unwrap();
        let records = log.read("p").await.unwrap();
        assert_eq!(records, vec![record(7)]);
    }

    #[tokio::test]
    async fn concurrent_appends_are_serialized() {
        let (_, log) = memory_log();
        let log = Arc::new(log);
        let tasks: Vec<_> = (0..20)
            .map(|n| {
                let log = log.clone();
                tokio::spawn(async move { log.append("p", &record(n)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(log.read("p").await.unwrap().len(), 20);
        assert!(log.locks.is_empty());
    }

    #[test]
    fn fs_store_file_names_are_distinct_per_scope() {
        let store = FsContextStore::new("/ctx");
        let scopes = ["acme/1", "acme_1", "acme:1", "acme_2f1", "acme-1", "acme1"];
        let paths: std::collections::HashSet<_> = scopes.iter().map(|s| store.path_for(s)).collect();
        assert_eq!(paths.len(), scopes.len());
        assert_eq!(store.path_for("Proj-7"), Path::new("/ctx/Proj-7.json"));
    }

    #[tokio::test]
    async fn fs_store_keeps_similar_scopes_apart() {
        let dir = tempfile::tempdir().unwrap();
        let log = ProvenanceLog::new(Arc::new(FsContextStore::new(dir.path())));
        log.append("acme/1", &record(1)).await.unwrap();
        log.append("acme_1", &record(2)).await.unwrap();

        assert_eq!(log.read("acme/1").await.unwrap(), vec![record(1)]);
        assert_eq!(log.read("acme_1").await.unwrap(), vec![record(2)]);
        assert!(log.read("acme:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsContextStore::new(dir.path().join("ctx")));
        let log = ProvenanceLog::with_capacity(store.clone(), 2);
        for n in 1..=3 {
            log.append("proj/1", &record(n)).await.unwrap();
        }
        assert!(store.path_for("proj/1").ends_with("proj_2f1.json"));
        let records = log.read("proj/1").await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.revision_id.as_str()).collect();
        assert_eq!(ids, ["rev_0002", "rev_0003"]);
    }

    #[tokio::test]
    async fn fs_store_missing_scope_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContextStore::new(dir.path());
        assert_eq!(store.read("nothing").await.unwrap(), None);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let ir = crate::provider::MockRepairer::fallback_artifact();
        let hash = compute_ir_hash(&ir).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_ir_hash(&ir.clone()).unwrap());
    }
}
