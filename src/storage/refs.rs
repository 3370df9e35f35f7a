//!  Branch and reference management.
//!
//!  Git refs are the only mutable state in the object database. This module handles:
//! - branch creation, resolution and listing
//! - resolving arbitrary revisions (branch names, commit ids, `HEAD~1`, tree ids)
//! - lock refs under `refs/locks/`
//!
//! Lock refs always point at the empty blob; only their existence matters.
//! Creating one is a non-forcing reference write, so the object database
//! guarantees that at most one creator succeeds.

use git2::{ErrorCode, ObjectType, Repository};

use crate::storage::blob;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{branch_ref, lock_ref, CommitId, TreeId, BRANCH_REF_PREFIX, LOCK_REF_PREFIX};

/// Manages Git references (branches and locks).
pub struct RefManager;

impl RefManager {
    /// Resolve a full ref name to the commit it points at.
    ///
    /// Returns `None` if the ref does not exist (e.g. an unborn branch).
    pub fn resolve(repo: &Repository, refname: &str) -> StorageResult<Option<CommitId>> {
        let reference = match repo.find_reference(refname) {
            Ok(reference) => reference,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::NotACommit(refname.to_string()))?;

        Ok(Some(CommitId::new(commit.id())))
    }

    fn revparse<'repo>(repo: &'repo Repository, revspec: &str) -> StorageResult<git2::Object<'repo>> {
        repo.revparse_single(revspec).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                StorageError::RefNotFound(revspec.to_string())
            } else {
                StorageError::Git(e)
            }
        })
    }

    /// Resolve any revision to a tree, along with the commit it came from.
    ///
    /// Tree ids resolve to themselves with no commit.
    pub fn resolve_treeish(repo: &Repository, revspec: &str) -> StorageResult<(TreeId, Option<CommitId>)> {
        let object = Self::revparse(repo, revspec)?;

        match object.kind() {
            Some(ObjectType::Tree) => Ok((TreeId::new(object.id()), None)),
            _ => {
                let commit = object
                    .peel_to_commit()
                    .map_err(|_| StorageError::NotACommit(revspec.to_string()))?;
                Ok((TreeId::new(commit.tree_id()), Some(CommitId::new(commit.id()))))
            }
        }
    }

    /// Resolve a revision to a commit.
    pub fn resolve_commit(repo: &Repository, revspec: &str) -> StorageResult<CommitId> {
        let commit = Self::revparse(repo, revspec)?
            .peel_to_commit()
            .map_err(|_| StorageError::NotACommit(revspec.to_string()))?;
        Ok(CommitId::new(commit.id()))
    }

    /// Check if a branch exists.
    pub fn branch_exists(repo: &Repository, name: &str) -> bool {
        repo.find_reference(&branch_ref(name)).is_ok()
    }

    /// Create a new branch pointing at the commit `start_point` resolves to.
    ///
    /// Returns the full ref name of the new branch.
    pub fn create_branch(repo: &Repository, name: &str, start_point: &str) -> StorageResult<String> {
        let refname = branch_ref(name);
        let target = Self::resolve_commit(repo, start_point)?;

        repo.reference(&refname, target.raw(), false, &format!("branch: created from {}", start_point))
            .map_err(|e| {
                if e.code() == ErrorCode::Exists {
                    StorageError::BranchAlreadyExists(refname.clone())
                } else {
                    StorageError::Git(e)
                }
            })?;

        Ok(refname)
    }

    /// Delete a branch.
    pub fn delete_branch(repo: &Repository, name: &str) -> StorageResult<()> {
        let refname = branch_ref(name);
        let mut reference = repo
            .find_reference(&refname)
            .map_err(|_| StorageError::RefNotFound(refname.clone()))?;

        reference.delete()?;

        Ok(())
    }

    /// List all branches as full ref names.
    pub fn list_branches(repo: &Repository) -> StorageResult<Vec<String>> {
        Self::list_refs(repo, BRANCH_REF_PREFIX)
    }

    fn list_refs(repo: &Repository, prefix: &str) -> StorageResult<Vec<String>> {
        let mut result = Vec::new();
        for name in repo.references()?.names() {
            let name = name?;
            if name.starts_with(prefix) {
                result.push(name.to_string());
            }
        }
        result.sort();
        Ok(result)
    }

    // ==================== Lock refs ====================

    /// Full ref name for a lock id.
    pub fn lock_ref_name(id: &str) -> StorageResult<String> {
        Ok(lock_ref(id)?)
    }

    /// Try to create the lock ref for `id`.
    ///
    /// Returns `false` if the lock is already held.
    pub fn try_create_lock(repo: &Repository, id: &str) -> StorageResult<bool> {
        let refname = Self::lock_ref_name(id)?;
        let empty = blob::empty_blob(repo)?;

        match repo.reference(&refname, empty.raw(), false, "lock") {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::Exists => Ok(false),
            // a concurrent creator holds the ref's own lockfile
            Err(e) if e.code() == ErrorCode::Locked => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if the lock ref for `id` exists.
    pub fn lock_exists(repo: &Repository, id: &str) -> StorageResult<bool> {
        let refname = Self::lock_ref_name(id)?;
        match repo.find_reference(&refname) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the lock ref for `id`.
    pub fn delete_lock(repo: &Repository, id: &str) -> StorageResult<()> {
        let refname = Self::lock_ref_name(id)?;
        let mut reference = repo
            .find_reference(&refname)
            .map_err(|_| StorageError::RefNotFound(refname.clone()))?;
        reference.delete()?;
        Ok(())
    }

    /// List the ids of all currently held locks.
    pub fn list_locks(repo: &Repository) -> StorageResult<Vec<String>> {
        Ok(Self::list_refs(repo, LOCK_REF_PREFIX)?
            .into_iter()
            .filter_map(|name| name.strip_prefix(LOCK_REF_PREFIX).map(str::to_string))
            .collect())
    }
}
