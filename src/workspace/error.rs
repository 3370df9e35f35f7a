//! Workspace error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors that can occur while operating on a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No git repository at the configured path.
    #[error("git repository not found at {}", .0.display())]
    RepositoryNotFound(PathBuf),

    /// The index has uncommitted changes and the operation would lose or
    /// bundle them.
    #[error("repository has pending changes, cannot {operation} until they are committed")]
    PendingChanges { operation: String },

    /// The workspace isn't tracking a branch.
    #[error("workspace head is detached, no branch to commit to")]
    DetachedHead,

    /// A named lock stayed held for the whole wait window.
    #[error("lock wait timeout exceeded while trying to acquire lock '{id}' on {} (waited {waited:?})", .path.display())]
    LockWaitTimeout {
        id: String,
        path: PathBuf,
        waited: Duration,
    },
}

impl WorkspaceError {
    pub(crate) fn pending(operation: &str) -> Self {
        Self::PendingChanges {
            operation: operation.to_string(),
        }
    }

    /// Check if this error indicates the resource doesn't exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            WorkspaceError::Storage(e) => e.is_not_found(),
            WorkspaceError::RepositoryNotFound(_) => true,
            _ => false,
        }
    }

    /// Check if this error was caused by the clean/dirty state of the workspace.
    pub fn is_repository_state(&self) -> bool {
        matches!(
            self,
            WorkspaceError::PendingChanges { .. } | WorkspaceError::DetachedHead
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let missing = WorkspaceError::Storage(StorageError::PathNotFound("a/b".to_string()));
        assert!(missing.is_not_found());
        assert!(!missing.is_repository_state());

        let pending = WorkspaceError::pending("switch branches");
        assert!(pending.is_repository_state());
        assert!(!pending.is_not_found());
    }

    #[test]
    fn test_lock_timeout_message() {
        let err = WorkspaceError::LockWaitTimeout {
            id: "person/1".to_string(),
            path: PathBuf::from("/srv/data"),
            waited: Duration::from_secs(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("'person/1'"));
        assert!(msg.contains("/srv/data"));
    }
}
