//! Lifecycle types shared by the manager, the throttle and the shell.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduling eligibility of an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Foreground,
    Background,
    Suspended,
    Error,
    Closed,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 5] = [
        LifecycleState::Foreground,
        LifecycleState::Background,
        LifecycleState::Suspended,
        LifecycleState::Error,
        LifecycleState::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Foreground => "foreground",
            LifecycleState::Background => "background",
            LifecycleState::Suspended => "suspended",
            LifecycleState::Error => "error",
            LifecycleState::Closed => "closed",
        }
    }

    /// Everything except `closed` counts as an active (mounted) app.
    pub fn is_active(&self) -> bool {
        !matches!(self, LifecycleState::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry supplied by the host. Only `id` matters to the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
}

impl AppDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            hotkey: None,
        }
    }

    pub fn with_hotkey(mut self, hotkey: impl Into<String>) -> Self {
        self.hotkey = Some(hotkey.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLifecycleEntry {
    pub id: String,
    pub state: LifecycleState,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Manager-wide transition counter; orders entries whose timestamps tie.
    #[serde(skip)]
    pub(crate) revision: u64,
}

impl AppLifecycleEntry {
    pub(crate) fn closed(id: &str, now: DateTime<Utc>, revision: u64) -> Self {
        Self {
            id: id.to_string(),
            state: LifecycleState::Closed,
            updated_at: now,
            error_message: None,
            revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&LifecycleState::Foreground).unwrap();
        assert_eq!(json, "\"foreground\"");
        let parsed: LifecycleState = serde_json::from_str("\"suspended\"").unwrap();
        assert_eq!(parsed, LifecycleState::Suspended);
    }

    #[test]
    fn test_only_closed_is_inactive() {
        for state in LifecycleState::ALL {
            assert_eq!(state.is_active(), state != LifecycleState::Closed);
        }
    }

    #[test]
    fn test_entry_serializes_camel_case_without_revision() {
        let entry = AppLifecycleEntry::closed("map", Utc::now(), 7);
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("updatedAt").is_some());
        assert!(value.get("revision").is_none());
        assert!(value.get("errorMessage").is_none());
    }
}
