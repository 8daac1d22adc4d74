//! Workspace Session Persistence
//!
//! Keeps the operator's workspace configuration (open panels, filters, focus
//! context) across reloads.
//!
//! ```text
//! WorkspaceSession (observable) → WorkspaceSessionStore → KeyValueStorage
//!   hydrate / patch / reset         load / persist / reset   get / set / delete
//! ```
//!
//! # Fail-safe Rules
//!
//! - Absent, unreadable, unparseable or wrong-version records load as the
//!   default snapshot. A stored record is never partially trusted.
//! - Writes are best effort. A failed write is logged and reported through
//!   [`PersistOutcome`], never raised.
//! - No write happens before hydration, so defaults never clobber a stored
//!   session during startup.
//!
//! # Module Structure
//!
//! - [`snapshot`]: The persisted snapshot shape and merge-patches
//! - [`store`]: Namespaced load/persist/reset over a storage backend
//! - [`hook`]: The hydrate-then-persist observable store

mod hook;
mod snapshot;
mod store;

pub use hook::WorkspaceSession;
pub use snapshot::{SessionPatch, WorkspaceSessionSnapshot, SNAPSHOT_VERSION};
pub use store::{PersistOutcome, WorkspaceSessionStore};
