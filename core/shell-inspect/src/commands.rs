//! Subcommand implementations. Output goes to stdout; diagnostics go to tracing.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use shell_core::boot::resolve_boot_mode_within;
use shell_core::throttle::throttle_multiplier;
use shell_core::{
    build_boot_plan, load_shell_config, resolve_lifecycle_throttle_ms, should_run_lifecycle_work,
    FileStorage, KeyValueStorage, LifecycleState, SessionPatch, ShellConfig, ShellError,
    StorageConfig, SystemClock, WorkspaceSessionStore,
};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error("Failed to render output: {0}")]
    Render(#[from] serde_json::Error),

    #[error("Failed to reset session {scope}")]
    ResetFailed { scope: String },
}

pub struct Context {
    storage: StorageConfig,
    config: ShellConfig,
}

impl Context {
    pub fn resolve(root: Option<PathBuf>) -> Result<Self, ShellError> {
        let storage = match root {
            Some(root) => StorageConfig::with_root(root),
            None => StorageConfig::from_home()?,
        };
        let config = load_shell_config(&storage.config_file());
        debug!(root = %storage.root().display(), namespace = %config.namespace, "Resolved storage");
        Ok(Self { storage, config })
    }

    fn file_storage(&self) -> FileStorage {
        self.storage.session_storage()
    }

    fn session_store(&self) -> WorkspaceSessionStore {
        WorkspaceSessionStore::new(
            Arc::new(self.file_storage()),
            self.config.namespace.clone(),
            Arc::new(SystemClock::new()),
        )
    }
}

pub fn session_show(context: &Context, scope: &str) -> Result<(), InspectError> {
    let store = context.session_store();
    let snapshot = store.load(scope, &SessionPatch::default());
    if store.last_persisted_at(scope).is_none() {
        info!(scope, "No stored session, showing defaults");
    }
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

pub fn session_reset(context: &Context, scope: &str) -> Result<(), InspectError> {
    if context.session_store().reset(scope).is_applied() {
        println!("Reset {}", context.session_store().record_key(scope));
        Ok(())
    } else {
        Err(InspectError::ResetFailed {
            scope: scope.to_string(),
        })
    }
}

pub fn session_keys(context: &Context) -> Result<(), InspectError> {
    let keys = context.file_storage().keys()?;
    if keys.is_empty() {
        println!("  (no stored sessions)");
    }
    for key in keys {
        println!("  {key}");
    }
    Ok(())
}

pub fn boot(context: &Context, scope: &str, reduced_motion: bool) -> Result<(), InspectError> {
    let last_session = context.session_store().last_persisted_at(scope);
    let mode = resolve_boot_mode_within(
        last_session.as_deref(),
        Utc::now(),
        context.config.boot.resume_window_secs,
    );
    let plan = build_boot_plan(mode, reduced_motion);

    println!(
        "Scope {} │ last session {} │ mode {}",
        scope,
        last_session.as_deref().unwrap_or("never"),
        plan.mode
    );
    for (index, step) in plan.steps.iter().enumerate() {
        println!(
            "  {}. {:<18} {:>4}ms  {}",
            index + 1,
            step.phase.as_str(),
            step.transition_ms,
            step.label
        );
    }
    Ok(())
}

pub fn throttle(base_ms: u64) {
    println!("Base interval {base_ms}ms");
    for state in LifecycleState::ALL {
        let runs = if should_run_lifecycle_work(state) {
            "runs"
        } else {
            "skips"
        };
        println!(
            "  {:<11} x{:<4} {:>9}ms  {}",
            state.as_str(),
            throttle_multiplier(state),
            resolve_lifecycle_throttle_ms(base_ms, state),
            runs
        );
    }
}
