//! Workspaces: a branch plus an in-memory index.
//!
//! A [`Workspace`] behaves like a git working directory that lives only in
//! memory. It is either clean (the index equals the branch tip) or dirty,
//! and it refuses anything that would throw dirty state away, such as
//! switching branches or starting an auto-commit block.
//!
//! ```text
//!   open ──► CLEAN ──add / add_blob / remove──► DIRTY
//!              ▲                                  │
//!              └─────────────── commit ───────────┘
//! ```
//!
//! Named locks ([`LockGuard`]) coordinate processes that share a
//! repository.

mod api;
mod config;
mod error;
mod lock;

pub use api::{BranchInfo, Head, Workspace};
pub use config::{WorkspaceConfig, DEFAULT_BRANCH, DEFAULT_LOCK_WAIT_INTERVAL, DEFAULT_LOCK_WAIT_TIMEOUT};
pub use error::{WorkspaceError, WorkspaceResult};
pub use lock::LockGuard;
