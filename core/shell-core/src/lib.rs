//! # shell-core
//!
//! Runtime for the workspace shell: the layer that decides which mounted app
//! (panel/tool) is in front, how often background apps may refresh, how the
//! boot overlay sequences itself, and what workspace configuration survives a
//! reload.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. `profile_async` accepts any
//!   `Future`, so clients bring their own executor.
//! - **Single owner**: No ambient singletons. The host creates a
//!   [`WorkspaceShell`] when the workspace mounts and drops it on unmount.
//! - **Graceful degradation**: Storage and parse failures resolve to defaults.
//!   Unknown app ids are no-ops. Nothing here is fatal to the host.
//! - **Observable**: Lifecycle, session and tray state expose
//!   subscribe/unsubscribe so UI layers re-render on change.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shell_core::{AppDescriptor, MemoryStorage, ShellConfig, SystemClock, WorkspaceShell};
//!
//! let catalog = vec![AppDescriptor::new("map", "Map"), AppDescriptor::new("chat", "Chat")];
//! let mut shell = WorkspaceShell::mount(
//!     ShellConfig::default(),
//!     &catalog,
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(SystemClock::new()),
//!     "ops-floor",
//! );
//! shell.focus("map");
//! let interval = shell.throttle_ms("chat", 30_000);
//! ```

pub mod boot;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observer;
pub mod session;
pub mod shell;
pub mod storage;
pub mod throttle;
pub mod tray;

pub use boot::{build_boot_plan, resolve_boot_mode, BootMode, BootPhase, BootPlan, BootSequence, BootStep};
pub use clock::{Clock, CoarseClock, ManualClock, SystemClock};
pub use config::{load_shell_config, save_shell_config, BootConfig, ProfilerConfig, ShellConfig, TrayConfig};
pub use error::{Result, ShellError};
pub use lifecycle::{AppDescriptor, AppLifecycleEntry, LifecycleManager, LifecycleState};
pub use observer::SubscriptionId;
pub use session::{
    PersistOutcome, SessionPatch, WorkspaceSession, WorkspaceSessionSnapshot, WorkspaceSessionStore,
};
pub use shell::WorkspaceShell;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageConfig};
pub use throttle::{
    resolve_lifecycle_throttle_ms, should_run_lifecycle_work, LifecycleThrottle, PerformanceSample,
    Profiler, SampleSummary,
};
pub use tray::{NewNotification, NotificationLevel, TrayFilter, TrayNotification, TrayQueue};
