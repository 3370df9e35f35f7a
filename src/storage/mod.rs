//! storage layer for gitmodel
//!
//! this module provides the object-database side of gitmodel: content
//! addressed blobs and trees, commits, branches and lock refs. The upper
//! layers (workspace, models) use this API and never touch git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GitRepository                           │
//! │        (shared handle: Arc<Mutex<git2::Repository>>)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ tree / path │       │    blob     │       │    refs     │
//!  │ (build_path,│       │  (payloads) │       │ (branches,  │
//!  │  glob, walk)│       │             │       │   locks)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                        ┌─────────────┐
//!                        │   commit    │
//!                        │(history/diff)│
//!                        └─────────────┘
//!  ```
//!
//! Trees are never mutated. Every change produces new tree objects from
//! the changed leaf up to the root, and everything off that path keeps
//! its id.
//!
//! # Usage
//!
//! ```ignore
//! use gitmodel::storage::{build_path, describe_tree, write_blob, PathEntry};
//!
//! let blob = write_blob(&repo, b"{}")?;
//! let root = build_path(&repo, "foo/bar/baz", &[PathEntry::blob("qux.txt", blob)], None)?;
//! assert_eq!(
//!     describe_tree(&repo, root, 2)?,
//!     "foo/\n  bar/\n    baz/\n      qux.txt"
//! );
//! ```

mod blob;
mod commit;
mod error;
mod path;
mod refs;
mod repository;
mod tree;
mod types;

// Re-export public API
pub use blob::{read_blob, write_blob};
pub use commit::{count_changes, diff_trees, get_commit, history, CommitBuilder, CommitInfo, HistoryIterator};
pub use error::{StorageError, StorageResult};
pub use path::{describe_tree, glob, has_magic, walk, Glob, WalkStep};
pub use refs::RefManager;
pub use repository::GitRepository;
pub use tree::{
    build_path, empty_tree, entries, lookup, normalize, remove_path, split_path, subtree, TreeEntryInfo,
};
pub use types::{
    branch_ref, lock_ref, BlobId, Change, ChangeStatus, CommitId, EntryMode, GitSignature, InvalidNameError,
    ObjectId, PathEntry, RecordKey, TreeId, BRANCH_REF_PREFIX, LOCK_REF_PREFIX,
};

// Re-export for internal use by other modules
pub(crate) use commit::tree_of;
