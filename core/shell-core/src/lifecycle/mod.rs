//! App Lifecycle State Machine
//!
//! Tracks the scheduling eligibility of every mounted app in the workspace.
//!
//! # States
//!
//! ```text
//!              ┌──────────── any state may move to any state ────────────┐
//! closed ── foreground ── background ── suspended ── error ── closed (re-enterable)
//! ```
//!
//! The graph is fully connected. The one rule is **single-foreground
//! exclusivity**: promoting an app to `foreground` demotes every other
//! foreground app to `background` inside the same update, so no observer
//! ever sees two foreground entries.
//!
//! # Module Structure
//!
//! - [`types`]: App descriptors, lifecycle states and entries
//! - [`manager`]: The [`LifecycleManager`] that owns the entry map

mod manager;
mod types;

pub use manager::LifecycleManager;
pub use types::{AppDescriptor, AppLifecycleEntry, LifecycleState};
