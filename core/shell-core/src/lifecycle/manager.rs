//! Owns the lifecycle entry map and applies transitions.
//!
//! Operations on unknown ids are silent no-ops: UI callers can reference apps
//! that are not registered yet while the workspace is still starting.

use std::sync::Arc;

use tracing::debug;

use super::types::{AppDescriptor, AppLifecycleEntry, LifecycleState};
use crate::clock::Clock;
use crate::observer::{Listeners, SubscriptionId};

pub struct LifecycleManager {
    entries: Vec<AppLifecycleEntry>,
    catalog: Vec<AppDescriptor>,
    clock: Arc<dyn Clock>,
    revision: u64,
    listeners: Listeners<[AppLifecycleEntry]>,
}

impl LifecycleManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            catalog: Vec::new(),
            clock,
            revision: 0,
            listeners: Listeners::new(),
        }
    }

    /// Builds a manager with one `closed` entry per catalog app.
    pub fn from_catalog(catalog: &[AppDescriptor], clock: Arc<dyn Clock>) -> Self {
        let mut manager = Self::new(clock);
        for descriptor in catalog {
            manager.register(descriptor.clone());
        }
        manager
    }

    /// Registers every id as `closed`. Ids that already have an entry keep it.
    pub fn initialize<I, S>(&mut self, app_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.clock.now();
        let mut added = false;
        for id in app_ids {
            let id = id.as_ref();
            if self.position(id).is_some() {
                continue;
            }
            self.revision += 1;
            self.entries
                .push(AppLifecycleEntry::closed(id, now, self.revision));
            added = true;
        }
        if added {
            self.listeners.notify(&self.entries);
        }
    }

    /// Registers a catalog app. Re-registering refreshes the label/hotkey only.
    pub fn register(&mut self, descriptor: AppDescriptor) {
        let id = descriptor.id.clone();
        match self.catalog.iter_mut().find(|known| known.id == id) {
            Some(known) => *known = descriptor,
            None => self.catalog.push(descriptor),
        }
        self.initialize([id]);
    }

    pub fn mark_foreground(&mut self, app_id: &str) {
        let Some(target) = self.position(app_id) else {
            debug!(app_id, "Ignoring foreground request for unknown app");
            return;
        };

        let now = self.clock.now();
        self.revision += 1;
        let demoted_revision = self.revision;

        for (index, entry) in self.entries.iter_mut().enumerate() {
            if index == target {
                continue;
            }
            if entry.state == LifecycleState::Foreground {
                debug!(app_id = %entry.id, from = "foreground", to = "background", "Demoting app");
                entry.state = LifecycleState::Background;
                entry.updated_at = now;
                entry.revision = demoted_revision;
            }
        }

        // The promoted app sorts ahead of the app it displaced.
        self.revision += 1;
        let entry = &mut self.entries[target];
        debug!(app_id, from = %entry.state, to = "foreground", "App transition");
        entry.state = LifecycleState::Foreground;
        entry.error_message = None;
        entry.updated_at = now;
        entry.revision = self.revision;

        self.listeners.notify(&self.entries);
    }

    pub fn mark_background(&mut self, app_id: &str) {
        self.transition(app_id, LifecycleState::Background, None);
    }

    pub fn mark_suspended(&mut self, app_id: &str) {
        self.transition(app_id, LifecycleState::Suspended, None);
    }

    pub fn mark_closed(&mut self, app_id: &str) {
        self.transition(app_id, LifecycleState::Closed, None);
    }

    pub fn mark_error(&mut self, app_id: &str, message: impl Into<String>) {
        self.transition(app_id, LifecycleState::Error, Some(message.into()));
    }

    fn transition(&mut self, app_id: &str, state: LifecycleState, error_message: Option<String>) {
        let Some(index) = self.position(app_id) else {
            debug!(app_id, to = %state, "Ignoring transition for unknown app");
            return;
        };

        let now = self.clock.now();
        self.revision += 1;
        let entry = &mut self.entries[index];
        debug!(app_id, from = %entry.state, to = %state, "App transition");
        entry.state = state;
        entry.error_message = error_message;
        entry.updated_at = now;
        entry.revision = self.revision;

        self.listeners.notify(&self.entries);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// All entries in registration order.
    pub fn entries(&self) -> &[AppLifecycleEntry] {
        &self.entries
    }

    pub fn entry(&self, app_id: &str) -> Option<&AppLifecycleEntry> {
        self.entries.iter().find(|entry| entry.id == app_id)
    }

    pub fn state_of(&self, app_id: &str) -> Option<LifecycleState> {
        self.entry(app_id).map(|entry| entry.state)
    }

    pub fn foreground_app_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.state == LifecycleState::Foreground)
            .map(|entry| entry.id.as_str())
    }

    /// Entries that are not `closed`, most recently updated first.
    pub fn active_apps(&self) -> Vec<&AppLifecycleEntry> {
        let mut active: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.state.is_active())
            .collect();
        active.sort_by(|left, right| {
            right
                .updated_at
                .cmp(&left.updated_at)
                .then_with(|| right.revision.cmp(&left.revision))
        });
        active
    }

    pub fn catalog(&self) -> &[AppDescriptor] {
        &self.catalog
    }

    pub fn descriptor(&self, app_id: &str) -> Option<&AppDescriptor> {
        self.catalog.iter().find(|descriptor| descriptor.id == app_id)
    }

    /// Resolves a catalog app by hotkey, ignoring case.
    pub fn app_for_hotkey(&self, hotkey: &str) -> Option<&AppDescriptor> {
        self.catalog.iter().find(|descriptor| {
            descriptor
                .hotkey
                .as_deref()
                .is_some_and(|key| key.eq_ignore_ascii_case(hotkey))
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────

    /// Listener receives the full entry list after every effective transition.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&[AppLifecycleEntry]) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn position(&self, app_id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == app_id)
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("entries", &self.entries)
            .field("catalog", &self.catalog)
            .field("listeners", &self.listeners)
            .finish()
    }
}
