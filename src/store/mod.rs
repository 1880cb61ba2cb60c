//! Status store -- run history and per-account status over an opaque KV backend.

pub mod kv;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub use kv::{KvBackend, MemoryKv, SqliteKv};

/// KV key holding the bounded run history.
pub const HISTORY_KEY: &str = "history";
/// KV key holding the timestamp of the most recent history save.
pub const LAST_RUN_KEY: &str = "last_run";
/// KV key holding the per-account status map.
pub const ACCOUNT_STATUS_KEY: &str = "account_status";

/// Default cap on persisted history entries.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Overall outcome of one persisted run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl RunStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            RunStatus::Success
        } else {
            RunStatus::Error
        }
    }
}

/// One persisted run record, most-recent-first in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: String,
    pub status: RunStatus,
    pub messages: Vec<String>,
}

/// Fields written through for one account after it has been processed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusPatch {
    pub name: String,
    pub last_run: String,
    pub success: bool,
    pub last_duration: u64,
}

/// Latest known outcome for one account, as read back from the store.
///
/// Records are merged key-by-key on write, so values persisted by an older
/// schema survive in `extra` until something overwrites them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatusRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_run: Option<String>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub last_duration: u64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Best-effort wrapper around the KV backend.
///
/// Every operation absorbs backend failures and malformed stored values:
/// reads fall back to an empty sequence or map, failed writes are logged and
/// dropped. A keep-alive run must never fail because persistence did.
///
/// Each operation is an unguarded read-modify-write; overlapping invocations
/// (a scheduled run racing a manual trigger) can lose updates. That matches
/// how the data is consumed -- last write wins on best-effort observability.
#[derive(Clone)]
pub struct StatusStore {
    backend: Option<Arc<dyn KvBackend>>,
    history_limit: usize,
}

impl StatusStore {
    pub fn new(backend: Option<Arc<dyn KvBackend>>, history_limit: usize) -> Self {
        Self {
            backend,
            history_limit,
        }
    }

    /// A store with no backend; every operation is a no-op.
    pub fn unbound() -> Self {
        Self::new(None, DEFAULT_HISTORY_LIMIT)
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    /// Prepend one run to the history, truncate to the cap, write back.
    /// Also records the save time under a scalar key.
    pub async fn append_history(&self, entry: HistoryEntry) {
        let Some(backend) = self.backend.as_deref() else {
            return;
        };

        let mut history = self.history().await;
        history.insert(0, entry);
        history.truncate(self.history_limit);

        match serde_json::to_string(&history) {
            Ok(serialized) => match backend.put(HISTORY_KEY, &serialized).await {
                Ok(()) => {
                    let now = Utc::now().to_rfc3339();
                    if let Err(err) = backend.put(LAST_RUN_KEY, &now).await {
                        tracing::warn!(%err, "failed to persist last-run timestamp");
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to persist run history");
                }
            },
            Err(err) => {
                tracing::warn!(%err, "failed to encode run history");
            }
        }
    }

    /// Stored history, most-recent-first. Empty when the store is unbound,
    /// the key is missing, or the stored value is unparsable.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        let Some(backend) = self.backend.as_deref() else {
            return Vec::new();
        };

        match backend.get(HISTORY_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(history) => history,
                Err(err) => {
                    tracing::warn!(%err, "stored history unparsable, treating as empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(%err, "failed to read run history");
                Vec::new()
            }
        }
    }

    /// Shallow-merge `patch` into the stored record for `account_id` and
    /// stamp `updatedAt`. Keys not named by the patch keep their old values.
    pub async fn update_account_status(&self, account_id: &str, patch: &AccountStatusPatch) {
        let Some(backend) = self.backend.as_deref() else {
            return;
        };

        let mut status = self.account_status().await;

        let mut record = match status.remove(account_id) {
            Some(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        if let Ok(Value::Object(fields)) = serde_json::to_value(patch) {
            for (key, value) in fields {
                record.insert(key, value);
            }
        }
        record.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        status.insert(account_id.to_string(), Value::Object(record));

        match serde_json::to_string(&status) {
            Ok(serialized) => {
                if let Err(err) = backend.put(ACCOUNT_STATUS_KEY, &serialized).await {
                    tracing::warn!(%err, account_id, "failed to persist account status");
                }
            }
            Err(err) => {
                tracing::warn!(%err, account_id, "failed to encode account status");
            }
        }
    }

    /// Raw per-account status map, keyed by account id. Empty when the store
    /// is unbound or the stored value is not a JSON object.
    pub async fn account_status(&self) -> Map<String, Value> {
        let Some(backend) = self.backend.as_deref() else {
            return Map::new();
        };

        match backend.get(ACCOUNT_STATUS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    tracing::warn!("stored account status is not an object, treating as empty");
                    Map::new()
                }
                Err(err) => {
                    tracing::warn!(%err, "stored account status unparsable, treating as empty");
                    Map::new()
                }
            },
            Ok(None) => Map::new(),
            Err(err) => {
                tracing::warn!(%err, "failed to read account status");
                Map::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound_store(limit: usize) -> StatusStore {
        StatusStore::new(Some(Arc::new(MemoryKv::default())), limit)
    }

    fn entry(time: &str, status: RunStatus) -> HistoryEntry {
        HistoryEntry {
            time: time.to_string(),
            status,
            messages: vec![format!("run at {time}")],
        }
    }

    /// Backend whose every operation fails, standing in for a dead store.
    struct FailingKv;

    #[async_trait::async_trait]
    impl KvBackend for FailingKv {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("backend down")
        }

        async fn put(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("backend down")
        }
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_most_recent_first() {
        let store = bound_store(3);

        for i in 0..5 {
            store
                .append_history(entry(&format!("2024-01-0{}T00:00:00Z", i + 1), RunStatus::Success))
                .await;
        }

        let history = store.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].time, "2024-01-05T00:00:00Z");
        assert_eq!(history[2].time, "2024-01-03T00:00:00Z");
    }

    #[tokio::test]
    async fn test_append_records_last_run_key() {
        let backend = Arc::new(MemoryKv::default());
        let store = StatusStore::new(Some(backend.clone()), DEFAULT_HISTORY_LIMIT);

        store
            .append_history(entry("2024-01-01T00:00:00Z", RunStatus::Error))
            .await;

        assert!(backend.get(LAST_RUN_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unbound_store_is_a_noop() {
        let store = StatusStore::unbound();
        assert!(!store.is_bound());

        store
            .append_history(entry("2024-01-01T00:00:00Z", RunStatus::Success))
            .await;

        assert!(store.history().await.is_empty());
        assert!(store.account_status().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_backend_reads_as_empty() {
        let store = StatusStore::new(Some(Arc::new(FailingKv)), DEFAULT_HISTORY_LIMIT);

        assert!(store.history().await.is_empty());
        assert!(store.account_status().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_backend_absorbs_writes() {
        let store = StatusStore::new(Some(Arc::new(FailingKv)), DEFAULT_HISTORY_LIMIT);

        store
            .append_history(entry("2024-01-01T00:00:00Z", RunStatus::Success))
            .await;
        let patch = AccountStatusPatch {
            name: "A".to_string(),
            last_run: "2024-01-01T00:00:00Z".to_string(),
            success: true,
            last_duration: 5,
        };
        store.update_account_status("acc_1", &patch).await;

        // Neither write propagates; the store stays readable and empty.
        assert!(store.history().await.is_empty());
        assert!(store.account_status().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_treated_as_absent() {
        let backend = Arc::new(MemoryKv::default());
        backend.put(HISTORY_KEY, "{not json").await.unwrap();
        let store = StatusStore::new(Some(backend), DEFAULT_HISTORY_LIMIT);

        assert!(store.history().await.is_empty());

        // Appending over the corrupt value starts a fresh history.
        store
            .append_history(entry("2024-01-01T00:00:00Z", RunStatus::Success))
            .await;
        assert_eq!(store.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_status_roundtrip_is_in_lowercase() {
        let status = RunStatus::from_success(true);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"success\"");
        let status = RunStatus::from_success(false);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"error\"");
    }

    #[tokio::test]
    async fn test_update_creates_record_with_updated_at() {
        let store = bound_store(DEFAULT_HISTORY_LIMIT);
        let patch = AccountStatusPatch {
            name: "A".to_string(),
            last_run: "2024-01-01T00:00:00Z".to_string(),
            success: true,
            last_duration: 120,
        };

        store.update_account_status("acc_1", &patch).await;

        let status = store.account_status().await;
        let record: AccountStatusRecord =
            serde_json::from_value(status["acc_1"].clone()).unwrap();
        assert_eq!(record.name, "A");
        assert_eq!(record.last_run.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(record.success);
        assert_eq!(record.last_duration, 120);
        assert!(record.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_is_a_shallow_merge() {
        let backend = Arc::new(MemoryKv::default());
        backend
            .put(
                ACCOUNT_STATUS_KEY,
                r#"{"acc_1":{"name":"old","legacyField":"keep me"}}"#,
            )
            .await
            .unwrap();
        let store = StatusStore::new(Some(backend), DEFAULT_HISTORY_LIMIT);

        let patch = AccountStatusPatch {
            name: "new".to_string(),
            last_run: "2024-01-02T00:00:00Z".to_string(),
            success: false,
            last_duration: 7,
        };
        store.update_account_status("acc_1", &patch).await;

        let status = store.account_status().await;
        let record = status["acc_1"].as_object().unwrap();
        // Patched fields overwrite, unknown fields survive.
        assert_eq!(record["name"], "new");
        assert_eq!(record["legacyField"], "keep me");
        assert_eq!(record["success"], false);
    }

    #[tokio::test]
    async fn test_update_replaces_non_object_record() {
        let backend = Arc::new(MemoryKv::default());
        backend
            .put(ACCOUNT_STATUS_KEY, r#"{"acc_1":"scalar nonsense"}"#)
            .await
            .unwrap();
        let store = StatusStore::new(Some(backend), DEFAULT_HISTORY_LIMIT);

        let patch = AccountStatusPatch {
            name: "A".to_string(),
            last_run: "2024-01-01T00:00:00Z".to_string(),
            success: true,
            last_duration: 5,
        };
        store.update_account_status("acc_1", &patch).await;

        let status = store.account_status().await;
        assert_eq!(status["acc_1"]["name"], "A");
    }

    #[tokio::test]
    async fn test_corrupt_account_status_treated_as_empty() {
        let backend = Arc::new(MemoryKv::default());
        backend.put(ACCOUNT_STATUS_KEY, "[1,2,3]").await.unwrap();
        let store = StatusStore::new(Some(backend), DEFAULT_HISTORY_LIMIT);

        assert!(store.account_status().await.is_empty());
    }
}
