//! Model error types.

use thiserror::Error;

use crate::storage::{InvalidNameError, StorageError};
use crate::workspace::WorkspaceError;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors from reading and writing records.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No record with this id at the requested revision.
    #[error("{model} with id {id}{} does not exist", revision_display(.revision))]
    DoesNotExist {
        model: String,
        id: String,
        revision: Option<String>,
    },

    /// A record with this id already exists.
    #[error("a {model} instance already exists with id \"{id}\"")]
    Integrity { model: String, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The payload was written by a different model.
    #[error("payload belongs to model {found}, expected {expected}")]
    ModelMismatch { expected: String, found: String },

    #[error("invalid record key: {0}")]
    InvalidKey(#[from] InvalidNameError),
}

fn revision_display(revision: &Option<String>) -> String {
    match revision {
        Some(rev) => format!("@{}", rev),
        None => String::new(),
    }
}

impl ModelError {
    /// Check if this error indicates the record or its revision doesn't exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            ModelError::DoesNotExist { .. } => true,
            ModelError::Workspace(e) => e.is_not_found(),
            ModelError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_does_not_exist_message() {
        let err = ModelError::DoesNotExist {
            model: "Person".to_string(),
            id: "john".to_string(),
            revision: None,
        };
        assert_eq!(err.to_string(), "Person with id john does not exist");
        assert!(err.is_not_found());

        let err = ModelError::DoesNotExist {
            model: "Person".to_string(),
            id: "john".to_string(),
            revision: Some("refs/heads/old".to_string()),
        };
        assert_eq!(err.to_string(), "Person with id john@refs/heads/old does not exist");
    }
}
