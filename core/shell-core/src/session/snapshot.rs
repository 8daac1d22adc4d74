//! Serialized workspace snapshot and the merge-patch applied to it.
//!
//! On-disk format is camelCase JSON, version 1.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

pub const DEFAULT_ELEMENT_FILTER: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSessionSnapshot {
    pub version: u32,
    pub bridge_id: Option<String>,
    pub preset_id: Option<String>,
    pub variant_id: Option<String>,
    pub op_id: Option<String>,
    pub element_filter: String,
    pub actor_id: Option<String>,
    pub focus_mode: bool,
    pub force_design_op_id: Option<String>,
    pub reports_op_id: Option<String>,
    pub active_panel_ids: Vec<String>,
    pub updated_at: String,
}

impl WorkspaceSessionSnapshot {
    /// Baseline snapshot with `overrides` applied.
    pub fn with_defaults(overrides: &SessionPatch, now: DateTime<Utc>) -> Self {
        let mut snapshot = Self {
            version: SNAPSHOT_VERSION,
            bridge_id: None,
            preset_id: None,
            variant_id: None,
            op_id: None,
            element_filter: DEFAULT_ELEMENT_FILTER.to_string(),
            actor_id: None,
            focus_mode: false,
            force_design_op_id: None,
            reports_op_id: None,
            active_panel_ids: Vec::new(),
            updated_at: format_timestamp(now),
        };
        overrides.apply_to(&mut snapshot);
        snapshot
    }

    /// Equality ignoring `updated_at`.
    pub fn same_content(&self, other: &Self) -> bool {
        Self {
            updated_at: String::new(),
            ..self.clone()
        } == Self {
            updated_at: String::new(),
            ..other.clone()
        }
    }
}

pub(crate) fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Partial update for a snapshot. `None` leaves a field untouched.
///
/// Nullable fields take `Some(None)` to clear them. Also used as the set of
/// default overrides when no stored snapshot exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_design_op_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_op_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_panel_ids: Option<Vec<String>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn bridge_id(mut self, value: Option<&str>) -> Self {
        self.bridge_id = Some(value.map(str::to_string));
        self
    }

    pub fn preset_id(mut self, value: Option<&str>) -> Self {
        self.preset_id = Some(value.map(str::to_string));
        self
    }

    pub fn variant_id(mut self, value: Option<&str>) -> Self {
        self.variant_id = Some(value.map(str::to_string));
        self
    }

    pub fn op_id(mut self, value: Option<&str>) -> Self {
        self.op_id = Some(value.map(str::to_string));
        self
    }

    pub fn element_filter(mut self, value: impl Into<String>) -> Self {
        self.element_filter = Some(value.into());
        self
    }

    pub fn actor_id(mut self, value: Option<&str>) -> Self {
        self.actor_id = Some(value.map(str::to_string));
        self
    }

    pub fn focus_mode(mut self, value: bool) -> Self {
        self.focus_mode = Some(value);
        self
    }

    pub fn force_design_op_id(mut self, value: Option<&str>) -> Self {
        self.force_design_op_id = Some(value.map(str::to_string));
        self
    }

    pub fn reports_op_id(mut self, value: Option<&str>) -> Self {
        self.reports_op_id = Some(value.map(str::to_string));
        self
    }

    pub fn active_panel_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_panel_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Shallow merge onto `snapshot`. Never touches `version` or `updated_at`.
    pub fn apply_to(&self, snapshot: &mut WorkspaceSessionSnapshot) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut snapshot.bridge_id, &self.bridge_id);
        set(&mut snapshot.preset_id, &self.preset_id);
        set(&mut snapshot.variant_id, &self.variant_id);
        set(&mut snapshot.op_id, &self.op_id);
        set(&mut snapshot.element_filter, &self.element_filter);
        set(&mut snapshot.actor_id, &self.actor_id);
        set(&mut snapshot.focus_mode, &self.focus_mode);
        set(&mut snapshot.force_design_op_id, &self.force_design_op_id);
        set(&mut snapshot.reports_op_id, &self.reports_op_id);
        set(&mut snapshot.active_panel_ids, &self.active_panel_ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pin_version() {
        let snapshot = WorkspaceSessionSnapshot::with_defaults(&SessionPatch::new(), Utc::now());
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.element_filter, DEFAULT_ELEMENT_FILTER);
        assert!(snapshot.active_panel_ids.is_empty());
        assert!(!snapshot.focus_mode);
    }

    #[test]
    fn test_defaults_apply_overrides() {
        let overrides = SessionPatch::new().bridge_id(Some("bridge-7")).focus_mode(true);
        let snapshot = WorkspaceSessionSnapshot::with_defaults(&overrides, Utc::now());
        assert_eq!(snapshot.bridge_id.as_deref(), Some("bridge-7"));
        assert!(snapshot.focus_mode);
    }

    #[test]
    fn test_patch_leaves_untouched_fields() {
        let mut snapshot = WorkspaceSessionSnapshot::with_defaults(
            &SessionPatch::new().op_id(Some("op-1")).actor_id(Some("actor-9")),
            Utc::now(),
        );
        SessionPatch::new()
            .actor_id(None)
            .active_panel_ids(["map", "chat"])
            .apply_to(&mut snapshot);

        assert_eq!(snapshot.op_id.as_deref(), Some("op-1"));
        assert_eq!(snapshot.actor_id, None);
        assert_eq!(snapshot.active_panel_ids, vec!["map", "chat"]);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn test_snapshot_serializes_camel_case_with_nulls() {
        let snapshot = WorkspaceSessionSnapshot::with_defaults(&SessionPatch::new(), Utc::now());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["bridgeId"].is_null());
        assert_eq!(value["elementFilter"], "all");
        assert!(value.get("activePanelIds").unwrap().is_array());
        assert!(value.get("forceDesignOpId").is_some());
    }

    #[test]
    fn test_patch_deserializes_null_as_untouched() {
        let patch: SessionPatch = serde_json::from_str(r#"{"bridgeId":null,"focusMode":true}"#).unwrap();
        // Explicit null reads as untouched; clearing goes through the builder.
        assert_eq!(patch.bridge_id, None);
        assert_eq!(patch.focus_mode, Some(true));
        assert!(!patch.is_empty());
        assert!(SessionPatch::new().is_empty());
    }

    #[test]
    fn test_same_content_ignores_updated_at() {
        let first = WorkspaceSessionSnapshot::with_defaults(&SessionPatch::new(), Utc::now());
        let mut second = first.clone();
        second.updated_at = "2020-01-01T00:00:00.000Z".to_string();
        assert!(first.same_content(&second));
        second.focus_mode = true;
        assert!(!first.same_content(&second));
    }
}
