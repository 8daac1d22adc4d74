//! Composes the runtime components for one mounted workspace.
//!
//! The host creates a [`WorkspaceShell`] when the workspace mounts and drops
//! it on unmount. The shell is the single owner of the lifecycle map; the
//! throttle, session and tray only ever read it.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::boot::{build_boot_plan, resolve_boot_mode_within, BootMode, BootPlan, BootSequence};
use crate::clock::Clock;
use crate::config::ShellConfig;
use crate::lifecycle::{AppDescriptor, LifecycleManager, LifecycleState};
use crate::session::{SessionPatch, WorkspaceSession, WorkspaceSessionStore};
use crate::storage::KeyValueStorage;
use crate::throttle::{LifecycleThrottle, PerformanceSample, Profiler};
use crate::tray::{NewNotification, NotificationLevel, TrayQueue};

pub struct WorkspaceShell {
    config: ShellConfig,
    lifecycle: LifecycleManager,
    profiler: Profiler,
    session: WorkspaceSession,
    tray: TrayQueue,
    boot_mode: BootMode,
}

impl WorkspaceShell {
    /// Registers the catalog, resolves the boot mode from the stored session's
    /// recency, then hydrates the session for `scope_key`.
    ///
    /// Panels listed in the restored `activePanelIds` come back as
    /// `background`, with the first one foregrounded.
    pub fn mount(
        config: ShellConfig,
        catalog: &[AppDescriptor],
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        scope_key: &str,
    ) -> Self {
        Self::mount_with_defaults(config, catalog, storage, clock, scope_key, SessionPatch::default())
    }

    pub fn mount_with_defaults(
        config: ShellConfig,
        catalog: &[AppDescriptor],
        storage: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        scope_key: &str,
        defaults: SessionPatch,
    ) -> Self {
        let config = config.normalized();
        let store = WorkspaceSessionStore::new(storage, config.namespace.clone(), clock.clone());

        // Read recency before hydration; nothing is written until after it.
        let last_session = store.last_persisted_at(scope_key);
        let boot_mode = resolve_boot_mode_within(
            last_session.as_deref(),
            clock.now(),
            config.boot.resume_window_secs,
        );

        let lifecycle = LifecycleManager::from_catalog(catalog, clock.clone());
        let profiler = Profiler::new(config.profiling.clone(), clock.clone());
        let tray = TrayQueue::new(config.tray.clone(), clock);
        let session = WorkspaceSession::mount(store, scope_key, defaults);

        let mut shell = Self {
            config,
            lifecycle,
            profiler,
            session,
            tray,
            boot_mode,
        };
        shell.restore_panels();
        info!(scope = scope_key, mode = %boot_mode, apps = catalog.len(), "Workspace shell mounted");
        shell
    }

    fn restore_panels(&mut self) {
        let panels = self.session.snapshot().active_panel_ids.clone();
        for panel in panels.iter().rev() {
            self.lifecycle.mark_background(panel);
        }
        if let Some(first) = panels.first() {
            self.lifecycle.mark_foreground(first);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Boot
    // ─────────────────────────────────────────────────────────────────────

    pub fn boot_mode(&self) -> BootMode {
        self.boot_mode
    }

    pub fn boot_plan(&self, reduced_motion: bool) -> BootPlan {
        build_boot_plan(self.boot_mode, reduced_motion)
    }

    pub fn boot_sequence(&self, reduced_motion: bool) -> BootSequence {
        BootSequence::new(self.boot_plan(reduced_motion))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Foregrounds `app_id` and moves it to the front of `activePanelIds`.
    /// Unknown apps are ignored.
    pub fn focus(&mut self, app_id: &str) {
        if self.lifecycle.entry(app_id).is_none() {
            return;
        }
        self.lifecycle.mark_foreground(app_id);
        self.session.patch_with(|snapshot| {
            snapshot.active_panel_ids.retain(|id| id != app_id);
            snapshot.active_panel_ids.insert(0, app_id.to_string());
        });
    }

    /// Foregrounds the catalog app bound to `hotkey`. Returns its id.
    pub fn focus_hotkey(&mut self, hotkey: &str) -> Option<String> {
        let app_id = self.lifecycle.app_for_hotkey(hotkey)?.id.clone();
        self.focus(&app_id);
        Some(app_id)
    }

    /// Closes `app_id` and drops it from `activePanelIds`.
    pub fn close(&mut self, app_id: &str) {
        if self.lifecycle.entry(app_id).is_none() {
            return;
        }
        self.lifecycle.mark_closed(app_id);
        self.session.patch_with(|snapshot| {
            snapshot.active_panel_ids.retain(|id| id != app_id);
        });
    }

    /// Moves the app to `error` and raises a critical tray notification.
    pub fn report_error(&mut self, app_id: &str, message: &str) {
        if self.lifecycle.entry(app_id).is_none() {
            return;
        }
        self.lifecycle.mark_error(app_id, message);
        let label = self
            .lifecycle
            .descriptor(app_id)
            .map(|descriptor| descriptor.label.clone())
            .unwrap_or_else(|| app_id.to_string());
        self.tray.push(
            NewNotification::new(NotificationLevel::Critical, format!("{label} failed"))
                .with_detail(message)
                .with_source(app_id),
        );
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut LifecycleManager {
        &mut self.lifecycle
    }

    // ─────────────────────────────────────────────────────────────────────
    // Throttle
    // ─────────────────────────────────────────────────────────────────────

    pub fn throttle(&self) -> LifecycleThrottle<'_> {
        LifecycleThrottle::new(&self.lifecycle, &self.profiler)
    }

    pub fn throttle_ms(&self, app_id: &str, base_ms: u64) -> u64 {
        self.throttle().throttle_ms(app_id, base_ms)
    }

    pub fn should_run_work(&self, app_id: &str) -> bool {
        self.throttle().should_run_work(app_id)
    }

    pub fn profile_sync<T>(&self, label: &str, app_id: &str, work: impl FnOnce() -> T) -> T {
        self.throttle().profile_sync(label, app_id, work)
    }

    pub async fn profile_async<F: Future>(&self, label: &str, app_id: &str, work: F) -> F::Output {
        let state = self
            .lifecycle
            .state_of(app_id)
            .unwrap_or(LifecycleState::Closed);
        self.profiler.profile_async(label, app_id, state, work).await
    }

    pub fn recent_samples(&self) -> Vec<PerformanceSample> {
        self.profiler.recent_samples()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Replaces the profiler's slow-sample callback.
    pub fn on_slow_sample(&mut self, handler: impl Fn(&PerformanceSample) + Send + Sync + 'static) {
        self.profiler.set_slow_sample_handler(handler);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session & tray
    // ─────────────────────────────────────────────────────────────────────

    pub fn session(&self) -> &WorkspaceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WorkspaceSession {
        &mut self.session
    }

    pub fn tray(&self) -> &TrayQueue {
        &self.tray
    }

    pub fn tray_mut(&mut self) -> &mut TrayQueue {
        &mut self.tray
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }
}

impl std::fmt::Debug for WorkspaceShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceShell")
            .field("boot_mode", &self.boot_mode)
            .field("lifecycle", &self.lifecycle)
            .field("session", &self.session)
            .field("tray", &self.tray)
            .finish_non_exhaustive()
    }
}
