//!   Shared Git repository handle.
//!
//!  This wraps `git2::Repository` so it can be shared between workspaces,
//!  lock guards and threads. Everything else in the storage layer is a
//!  free function over `&git2::Repository`; this type only decides how
//!  that reference is obtained.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::Repository;
use parking_lot::Mutex;

use crate::storage::blob;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree;
use crate::storage::types::{BlobId, TreeId};

/// The shared repository handle.
///
/// Clone this to share across threads - it uses Arc internally.
/// `git2::Repository` is `Send` but not `Sync`, so access is serialized
/// through a mutex.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    repo: Mutex<Repository>,
    path: PathBuf,
}

impl GitRepository {
    fn from_repo(repo: Repository, path: &Path) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
            }),
        }
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;
        Ok(Self::from_repo(repo, path))
    }

    /// Initialize a new repository.
    ///
    /// No commit is created; the first commit on a branch is the first
    /// time it is written to.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;
        Ok(Self::from_repo(repo, path))
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        match Self::open(path.as_ref()) {
            Err(StorageError::NotInitialized(_)) => Self::init(path),
            other => other,
        }
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Repository) -> Result<T, E>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== Object helpers ====================

    /// Store bytes as a blob.
    pub fn write_blob(&self, content: &[u8]) -> StorageResult<BlobId> {
        self.with_repo(|repo| blob::write_blob(repo, content))
    }

    /// Read a blob's bytes.
    pub fn read_blob(&self, id: BlobId) -> StorageResult<Vec<u8>> {
        self.with_repo(|repo| blob::read_blob(repo, id))
    }

    /// Id of the empty tree.
    pub fn empty_tree(&self) -> StorageResult<TreeId> {
        self.with_repo(tree::empty_tree)
    }
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository").field("path", &self.inner.path).finish()
    }
}
