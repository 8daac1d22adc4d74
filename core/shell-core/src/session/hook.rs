//! Observable workspace session: hydrate first, then persist on every patch.
//!
//! Every mutation funnels through [`WorkspaceSession::patch_with`], so the
//! record written to storage is always the latest in-memory snapshot.

use tracing::debug;

use super::snapshot::{SessionPatch, WorkspaceSessionSnapshot, SNAPSHOT_VERSION};
use super::store::{PersistOutcome, WorkspaceSessionStore};
use crate::observer::{Listeners, SubscriptionId};

pub struct WorkspaceSession {
    store: WorkspaceSessionStore,
    scope_key: String,
    defaults: SessionPatch,
    snapshot: WorkspaceSessionSnapshot,
    hydrated: bool,
    listeners: Listeners<WorkspaceSessionSnapshot>,
}

impl WorkspaceSession {
    /// Starts un-hydrated with the default snapshot. Call [`Self::hydrate`]
    /// before relying on persistence.
    pub fn new(store: WorkspaceSessionStore, scope_key: impl Into<String>, defaults: SessionPatch) -> Self {
        let snapshot = store.default_snapshot(&defaults);
        Self {
            store,
            scope_key: scope_key.into(),
            defaults,
            snapshot,
            hydrated: false,
            listeners: Listeners::new(),
        }
    }

    /// Builds and immediately hydrates.
    pub fn mount(store: WorkspaceSessionStore, scope_key: impl Into<String>, defaults: SessionPatch) -> Self {
        let mut session = Self::new(store, scope_key, defaults);
        session.hydrate();
        session
    }

    /// Loads the stored snapshot for the current scope and enables persistence.
    pub fn hydrate(&mut self) {
        self.snapshot = self.store.load(&self.scope_key, &self.defaults);
        self.hydrated = true;
        debug!(scope = %self.scope_key, "Hydrated workspace session");
        self.listeners.notify(&self.snapshot);
    }

    /// Switches scope and re-hydrates. No-op when the scope is unchanged.
    pub fn set_scope(&mut self, scope_key: impl Into<String>) {
        let scope_key = scope_key.into();
        if scope_key == self.scope_key && self.hydrated {
            return;
        }
        self.scope_key = scope_key;
        self.hydrated = false;
        self.hydrate();
    }

    /// Merges `patch` into the snapshot. Persists only once hydrated.
    ///
    /// Returns `None` when the write was skipped because hydration has not
    /// happened yet.
    pub fn patch(&mut self, patch: SessionPatch) -> Option<PersistOutcome> {
        self.patch_with(|snapshot| patch.apply_to(snapshot))
    }

    /// Functional form of [`Self::patch`]. `version` stays pinned regardless
    /// of what `update` does to it.
    pub fn patch_with(&mut self, update: impl FnOnce(&mut WorkspaceSessionSnapshot)) -> Option<PersistOutcome> {
        update(&mut self.snapshot);
        self.snapshot.version = SNAPSHOT_VERSION;

        let outcome = if self.hydrated {
            Some(self.store.persist(&self.scope_key, &mut self.snapshot))
        } else {
            debug!(scope = %self.scope_key, "Skipping persist before hydration");
            None
        };

        self.listeners.notify(&self.snapshot);
        outcome
    }

    /// Clears storage for this scope, then re-hydrates from defaults.
    ///
    /// The in-memory snapshot returns to defaults even when the delete fails.
    pub fn reset(&mut self) -> PersistOutcome {
        let outcome = self.store.reset(&self.scope_key);
        self.snapshot = self.store.default_snapshot(&self.defaults);
        self.hydrated = true;
        debug!(scope = %self.scope_key, "Reset workspace session to defaults");
        self.listeners.notify(&self.snapshot);
        outcome
    }

    pub fn snapshot(&self) -> &WorkspaceSessionSnapshot {
        &self.snapshot
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    pub fn store(&self) -> &WorkspaceSessionStore {
        &self.store
    }

    pub fn subscribe(
        &mut self,
        listener: impl Fn(&WorkspaceSessionSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl std::fmt::Debug for WorkspaceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSession")
            .field("scope_key", &self.scope_key)
            .field("hydrated", &self.hydrated)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}
