//! Namespaced, fail-safe load/persist/reset of workspace snapshots.
//!
//! Records live under `<namespace>:<scopeKey>` in the injected storage.
//!
//! # Defensive Design
//!
//! Stored records can be stale, hand-edited or written by an older build, so
//! loading treats all of these as "absent" and returns the default snapshot:
//! - Storage read errors
//! - Corrupt JSON or a non-object payload
//! - Missing or mismatched `version`
//! - Fields with the wrong type
//!
//! Fields missing from an otherwise valid record resolve from the defaults.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::snapshot::{format_timestamp, SessionPatch, WorkspaceSessionSnapshot, SNAPSHOT_VERSION};
use crate::clock::Clock;
use crate::storage::KeyValueStorage;

/// Result of a best-effort storage write or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Applied,
    /// The backend refused; the failure was logged and in-memory state kept.
    Failed,
}

impl PersistOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PersistOutcome::Applied)
    }
}

#[derive(Clone)]
pub struct WorkspaceSessionStore {
    storage: Arc<dyn KeyValueStorage>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl WorkspaceSessionStore {
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            clock,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn record_key(&self, scope_key: &str) -> String {
        format!("{}:{}", self.namespace, scope_key)
    }

    pub fn default_snapshot(&self, overrides: &SessionPatch) -> WorkspaceSessionSnapshot {
        WorkspaceSessionSnapshot::with_defaults(overrides, self.clock.now())
    }

    /// Stored snapshot merged onto the defaults, or the defaults alone.
    pub fn load(&self, scope_key: &str, overrides: &SessionPatch) -> WorkspaceSessionSnapshot {
        let defaults = self.default_snapshot(overrides);
        self.read_stored(scope_key, &defaults).unwrap_or(defaults)
    }

    /// Stamps `version` and `updated_at` on `snapshot`, then writes it.
    pub fn persist(&self, scope_key: &str, snapshot: &mut WorkspaceSessionSnapshot) -> PersistOutcome {
        snapshot.version = SNAPSHOT_VERSION;
        snapshot.updated_at = format_timestamp(self.clock.now());

        let key = self.record_key(scope_key);
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to serialize workspace session");
                return PersistOutcome::Failed;
            }
        };

        match self.storage.set(&key, &payload) {
            Ok(()) => {
                debug!(key = %key, "Persisted workspace session");
                PersistOutcome::Applied
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to persist workspace session");
                PersistOutcome::Failed
            }
        }
    }

    pub fn reset(&self, scope_key: &str) -> PersistOutcome {
        let key = self.record_key(scope_key);
        match self.storage.delete(&key) {
            Ok(()) => {
                debug!(key = %key, "Reset workspace session");
                PersistOutcome::Applied
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to reset workspace session");
                PersistOutcome::Failed
            }
        }
    }

    /// `updatedAt` of a valid stored record; feeds boot mode resolution.
    pub fn last_persisted_at(&self, scope_key: &str) -> Option<String> {
        let defaults = self.default_snapshot(&SessionPatch::default());
        self.read_stored(scope_key, &defaults)
            .map(|snapshot| snapshot.updated_at)
    }

    fn read_stored(
        &self,
        scope_key: &str,
        defaults: &WorkspaceSessionSnapshot,
    ) -> Option<WorkspaceSessionSnapshot> {
        let key = self.record_key(scope_key);
        let raw = match self.storage.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to read workspace session, using defaults");
                return None;
            }
        };

        let stored = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(stored)) => stored,
            Ok(_) => {
                warn!(key = %key, "Workspace session is not a JSON object, using defaults");
                return None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Corrupt workspace session, using defaults");
                return None;
            }
        };

        let version = stored.get("version").and_then(Value::as_u64);
        if version != Some(u64::from(SNAPSHOT_VERSION)) {
            warn!(key = %key, version = ?version, expected = SNAPSHOT_VERSION, "Unsupported workspace session version, using defaults");
            return None;
        }

        match merge_onto_defaults(defaults, stored) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(key = %key, error = %err, "Workspace session has invalid fields, using defaults");
                None
            }
        }
    }
}

impl std::fmt::Debug for WorkspaceSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSessionStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Top-level keys of `stored` replace the defaults; everything else is kept.
fn merge_onto_defaults(
    defaults: &WorkspaceSessionSnapshot,
    stored: Map<String, Value>,
) -> serde_json::Result<WorkspaceSessionSnapshot> {
    let mut merged = match serde_json::to_value(defaults)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (field, value) in stored {
        merged.insert(field, value);
    }
    serde_json::from_value(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{Result, ShellError};
    use crate::storage::MemoryStorage;
    use std::time::Duration;

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(ShellError::StorageUnavailable("disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(ShellError::StorageUnavailable("quota exceeded".to_string()))
        }

        fn delete(&self, _key: &str) -> Result<()> {
            Err(ShellError::StorageUnavailable("disabled".to_string()))
        }
    }

    fn store_with(storage: Arc<dyn KeyValueStorage>) -> (WorkspaceSessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (
            WorkspaceSessionStore::new(storage, "nexus.workspace", clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_record_key_is_namespaced() {
        let (store, _) = store_with(Arc::new(MemoryStorage::new()));
        assert_eq!(store.record_key("ops"), "nexus.workspace:ops");
    }

    #[test]
    fn test_never_written_key_returns_defaults() {
        let (store, _) = store_with(Arc::new(MemoryStorage::new()));
        let snapshot = store.load("ops", &SessionPatch::new());
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.same_content(&store.default_snapshot(&SessionPatch::new())));
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let (store, clock) = store_with(Arc::new(MemoryStorage::new()));
        let mut snapshot = store.default_snapshot(
            &SessionPatch::new()
                .bridge_id(Some("bridge-2"))
                .active_panel_ids(["map", "reports"])
                .focus_mode(true),
        );

        assert_eq!(store.persist("ops", &mut snapshot), PersistOutcome::Applied);
        clock.advance(Duration::from_secs(30));

        let loaded = store.load("ops", &SessionPatch::new());
        assert!(loaded.same_content(&snapshot));
        assert_eq!(loaded.updated_at, snapshot.updated_at);
    }

    #[test]
    fn test_persist_stamps_version_and_updated_at() {
        let (store, clock) = store_with(Arc::new(MemoryStorage::new()));
        let mut snapshot = store.default_snapshot(&SessionPatch::new());
        let before = snapshot.updated_at.clone();
        snapshot.version = 9;
        clock.advance(Duration::from_secs(5));

        store.persist("ops", &mut snapshot);
        assert_eq!(snapshot.version, 1);
        assert_ne!(snapshot.updated_at, before);
    }

    #[test]
    fn test_corrupt_json_returns_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("nexus.workspace:ops", "{not json").unwrap();
        let (store, _) = store_with(storage);

        let snapshot = store.load("ops", &SessionPatch::new().preset_id(Some("night")));
        assert_eq!(snapshot.preset_id.as_deref(), Some("night"));
    }

    #[test]
    fn test_version_mismatch_returns_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set("nexus.workspace:ops", r#"{"version":2,"focusMode":true}"#)
            .unwrap();
        let (store, _) = store_with(storage);

        assert!(!store.load("ops", &SessionPatch::new()).focus_mode);
    }

    #[test]
    fn test_missing_version_returns_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("nexus.workspace:ops", r#"{"focusMode":true}"#).unwrap();
        let (store, _) = store_with(storage);

        assert!(!store.load("ops", &SessionPatch::new()).focus_mode);
    }

    #[test]
    fn test_non_object_payload_returns_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("nexus.workspace:ops", "[1,2,3]").unwrap();
        let (store, _) = store_with(storage);

        assert_eq!(store.load("ops", &SessionPatch::new()).version, 1);
    }

    #[test]
    fn test_wrong_field_type_is_not_partially_trusted() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                "nexus.workspace:ops",
                r#"{"version":1,"bridgeId":"bridge-1","focusMode":"yes"}"#,
            )
            .unwrap();
        let (store, _) = store_with(storage);

        let snapshot = store.load("ops", &SessionPatch::new());
        assert_eq!(snapshot.bridge_id, None);
        assert!(!snapshot.focus_mode);
    }

    #[test]
    fn test_missing_fields_fill_from_defaults() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                "nexus.workspace:ops",
                r#"{"version":1,"opId":"op-4","legacyField":42}"#,
            )
            .unwrap();
        let (store, _) = store_with(storage);

        let snapshot = store.load("ops", &SessionPatch::new().element_filter("sensors"));
        assert_eq!(snapshot.op_id.as_deref(), Some("op-4"));
        assert_eq!(snapshot.element_filter, "sensors");
        assert!(snapshot.active_panel_ids.is_empty());
    }

    #[test]
    fn test_broken_storage_degrades_silently() {
        let (store, _) = store_with(Arc::new(BrokenStorage));
        let mut snapshot = store.load("ops", &SessionPatch::new());

        assert_eq!(snapshot.version, 1);
        assert_eq!(store.persist("ops", &mut snapshot), PersistOutcome::Failed);
        assert_eq!(store.reset("ops"), PersistOutcome::Failed);
        assert_eq!(store.last_persisted_at("ops"), None);
    }

    #[test]
    fn test_reset_deletes_record() {
        let (store, _) = store_with(Arc::new(MemoryStorage::new()));
        let mut snapshot = store.default_snapshot(&SessionPatch::new().focus_mode(true));
        store.persist("ops", &mut snapshot);

        assert!(store.reset("ops").is_applied());
        assert!(!store.load("ops", &SessionPatch::new()).focus_mode);
        assert!(store.reset("ops").is_applied());
    }

    #[test]
    fn test_last_persisted_at_only_for_valid_records() {
        let storage = Arc::new(MemoryStorage::new());
        let (store, _) = store_with(storage.clone());
        assert_eq!(store.last_persisted_at("ops"), None);

        let mut snapshot = store.default_snapshot(&SessionPatch::new());
        store.persist("ops", &mut snapshot);
        assert_eq!(store.last_persisted_at("ops"), Some(snapshot.updated_at.clone()));

        storage.set("nexus.workspace:ops", r#"{"version":3}"#).unwrap();
        assert_eq!(store.last_persisted_at("ops"), None);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let (store, _) = store_with(Arc::new(MemoryStorage::new()));
        let mut snapshot = store.default_snapshot(&SessionPatch::new().op_id(Some("alpha")));
        store.persist("bridge-a", &mut snapshot);

        assert_eq!(store.load("bridge-b", &SessionPatch::new()).op_id, None);
        assert_eq!(
            store.load("bridge-a", &SessionPatch::new()).op_id.as_deref(),
            Some("alpha")
        );
    }
}
