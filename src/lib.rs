//! gitmodel - records stored in a Git repository
//!
//! This crate keeps structured records as blobs in a Git object database.
//! Directories are trees, every save builds a new root tree, and a commit
//! records it on a branch. History, diffs and branches come for free.
//!
//! - [`storage`] wraps the object database (blobs, trees, commits, refs)
//! - [`workspace`] keeps an in-memory index per branch and commits it
//! - [`model`] maps typed records onto paths in a workspace
//!
//! # Example
//!
//! ```no_run
//! use gitmodel::workspace::{Workspace, WorkspaceConfig};
//!
//! let config = WorkspaceConfig::new("./data").create_if_missing(true);
//! let mut ws = Workspace::open_with_config(config).unwrap();
//! ws.add_blob("people/john-doe/data.json", r#"{"name": "John"}"#).unwrap();
//! ws.commit("add john", None, None).unwrap();
//! ```

pub mod model;
pub mod storage;
pub mod workspace;

pub use model::{ModelHandle, ModelSchema, Record};
pub use storage::{GitRepository, GitSignature};
pub use workspace::{Workspace, WorkspaceConfig};
