//! Tray Notification Queue
//!
//! Leveled, timestamped messages surfaced in the taskbar tray, with
//! read/unread bookkeeping. Storage keeps creation order; newest-first and
//! the page cap are views layered on top.
//!
//! The queue is unbounded unless [`TrayConfig::max_retained`] is set. With a
//! cap, pushing past it evicts the oldest *read* entry first, then the oldest
//! entry overall, so unread alerts outlive acknowledged ones.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::config::TrayConfig;
use crate::observer::{Listeners, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Critical,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayNotification {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub level: NotificationLevel,
    /// Free-form origin tag, usually an app id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Input to [`TrayQueue::push`]; `id` and `created_at` are filled when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub id: Option<String>,
    pub title: String,
    pub detail: Option<String>,
    pub level: NotificationLevel,
    pub source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub fn new(level: NotificationLevel, title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            detail: None,
            level,
            source: None,
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// View filter. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrayFilter {
    pub level: Option<NotificationLevel>,
    pub read: Option<bool>,
}

impl TrayFilter {
    pub fn unread() -> Self {
        Self {
            level: None,
            read: Some(false),
        }
    }

    pub fn level(level: NotificationLevel) -> Self {
        Self {
            level: Some(level),
            read: None,
        }
    }

    pub fn matches(&self, notification: &TrayNotification) -> bool {
        self.level.map_or(true, |level| notification.level == level)
            && self.read.map_or(true, |read| notification.read == read)
    }
}

pub struct TrayQueue {
    config: TrayConfig,
    clock: Arc<dyn Clock>,
    notifications: Vec<TrayNotification>,
    listeners: Listeners<[TrayNotification]>,
}

impl TrayQueue {
    pub fn new(config: TrayConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            notifications: Vec::new(),
            listeners: Listeners::new(),
        }
    }

    /// Appends a notification and returns its id.
    ///
    /// A caller-supplied id that is already queued leaves the queue unchanged.
    pub fn push(&mut self, notification: NewNotification) -> String {
        if let Some(id) = notification.id.as_deref() {
            if self.get(id).is_some() {
                debug!(id, "Ignoring duplicate tray notification");
                return id.to_string();
            }
        }

        let id = notification
            .id
            .unwrap_or_else(|| ulid::Ulid::new().to_string());
        let created_at = notification.created_at.unwrap_or_else(|| self.clock.now());
        debug!(id = %id, level = %notification.level, "Tray notification pushed");

        self.notifications.push(TrayNotification {
            id: id.clone(),
            title: notification.title,
            detail: notification.detail,
            level: notification.level,
            source: notification.source,
            created_at,
            read: false,
        });
        self.enforce_retention();
        self.listeners.notify(&self.notifications);
        id
    }

    /// Idempotent. Returns false only for unknown ids.
    pub fn mark_read(&mut self, id: &str) -> bool {
        let Some(notification) = self.notifications.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !notification.read {
            notification.read = true;
            self.listeners.notify(&self.notifications);
        }
        true
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        if changed > 0 {
            self.listeners.notify(&self.notifications);
        }
        changed
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        let removed = self.notifications.len() != before;
        if removed {
            self.listeners.notify(&self.notifications);
        }
        removed
    }

    pub fn clear(&mut self) {
        if self.notifications.is_empty() {
            return;
        }
        self.notifications.clear();
        self.listeners.notify(&self.notifications);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Creation order.
    pub fn notifications(&self) -> &[TrayNotification] {
        &self.notifications
    }

    pub fn get(&self, id: &str) -> Option<&TrayNotification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    /// Newest `created_at` first; later pushes win ties.
    pub fn newest_first(&self) -> Vec<&TrayNotification> {
        self.filter(&TrayFilter::default())
    }

    /// Matching notifications, newest first.
    pub fn filter(&self, filter: &TrayFilter) -> Vec<&TrayNotification> {
        let mut matching: Vec<(usize, &TrayNotification)> = self
            .notifications
            .iter()
            .enumerate()
            .filter(|(_, n)| filter.matches(n))
            .collect();
        matching.sort_by_key(|(index, n)| Reverse((n.created_at, *index)));
        matching.into_iter().map(|(_, n)| n).collect()
    }

    /// First page of the newest-first view, capped at the configured page size.
    pub fn page(&self) -> Vec<&TrayNotification> {
        let mut newest = self.newest_first();
        newest.truncate(self.config.page_size);
        newest
    }

    pub fn subscribe(
        &mut self,
        listener: impl Fn(&[TrayNotification]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn enforce_retention(&mut self) {
        let Some(cap) = self.config.max_retained else {
            return;
        };
        while self.notifications.len() > cap {
            let victim = self
                .notifications
                .iter()
                .position(|n| n.read)
                .unwrap_or(0);
            let evicted = self.notifications.remove(victim);
            debug!(id = %evicted.id, "Evicted tray notification over retention cap");
        }
    }
}

impl fmt::Debug for TrayQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrayQueue")
            .field("config", &self.config)
            .field("notifications", &self.notifications)
            .finish()
    }
}
