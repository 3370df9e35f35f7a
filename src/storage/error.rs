//! Storage layer error types
//!
//! All errors that can occur while talking to the object database are
//! defined here. Failures coming out of git2 are propagated as-is; this
//! layer never tries to repair a broken object graph.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// nothing exists at the requested tree path
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// the specified branch/ref was not found
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// a start point or revision did not resolve to a commit
    #[error("not a commit: {0}")]
    NotACommit(String),

    /// the tree entry has an unexpected type
    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// invalid record key, branch or lock name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// a glob pattern segment failed to compile
    #[error("invalid glob pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    /// branch already exists
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// the ref moved between reading its tip and writing the commit
    #[error("concurrent modification: {reference} no longer points at the expected commit")]
    ConcurrentModification { reference: String },

    /// repo is not initialized
    #[error("repository not initialized: {0}")]
    NotInitialized(PathBuf),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::PathNotFound(_)
            | StorageError::RefNotFound(_)
            | StorageError::NotInitialized(_) => true,
            StorageError::Git(e) => e.code() == git2::ErrorCode::NotFound,
            _ => false,
        }
    }

    /// check if this error is a conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::BranchAlreadyExists(_) | StorageError::ConcurrentModification { .. }
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
