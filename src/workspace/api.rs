//! Workspace API - the in-memory index over a git repository.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use git2::build::CheckoutBuilder;
use tracing::debug;

use crate::model::{ModelHandle, ModelSchema, Record};
use crate::storage::{
    branch_ref, build_path, count_changes, describe_tree, diff_trees, empty_tree, entries, glob, history,
    lookup, normalize, read_blob, remove_path, split_path, subtree, tree_of, walk, BlobId, Change, CommitBuilder, CommitId,
    CommitInfo, EntryMode, GitRepository, GitSignature, InvalidNameError, PathEntry, RefManager,
    StorageError, StorageResult, TreeEntryInfo, TreeId, WalkStep, BRANCH_REF_PREFIX,
};
use crate::workspace::config::WorkspaceConfig;
use crate::workspace::error::{WorkspaceError, WorkspaceResult};

/// What the workspace index was checked out from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// Tracking a branch by full ref name. The branch may not exist yet.
    Branch(String),
    /// Checked out from something that isn't a branch (a commit id, a
    /// tree, `HEAD~1`...). Commits are refused in this state.
    Detached { tree: TreeId },
}

impl Head {
    /// full ref name of the tracked branch
    pub fn reference(&self) -> Option<&str> {
        match self {
            Head::Branch(reference) => Some(reference),
            Head::Detached { .. } => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached { .. })
    }
}

/// The tracked branch as it currently exists in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchInfo {
    pub reference: String,
    pub commit: CommitId,
    pub tree: TreeId,
}

/// A workspace: a branch, plus an in-memory index of the tree that the
/// next commit on it will have.
///
/// The repository's own INDEX and HEAD files are never used. Mutations
/// produce a new index tree; nothing in the repository moves until
/// [`Workspace::commit`].
///
/// A workspace is a single-writer object. Share the underlying
/// [`GitRepository`] (or open another workspace on the same path) to work
/// from several threads.
pub struct Workspace {
    repo: GitRepository,
    config: WorkspaceConfig,
    head: Head,
    index: TreeId,
    models: HashMap<String, Arc<ModelSchema>>,
}

impl Workspace {
    /// Open a workspace on an existing repository.
    pub fn open(path: impl AsRef<Path>) -> WorkspaceResult<Self> {
        Self::open_with_config(WorkspaceConfig::new(path.as_ref()))
    }

    /// Open a workspace with custom configuration.
    ///
    /// The index starts out as the tree of `initial_branch`, or the empty
    /// tree if that branch has no commits yet.
    pub fn open_with_config(config: WorkspaceConfig) -> WorkspaceResult<Self> {
        let repo = if config.create_if_missing {
            GitRepository::open_or_init(&config.path)?
        } else {
            GitRepository::open(&config.path).map_err(|e| match e {
                StorageError::NotInitialized(path) => WorkspaceError::RepositoryNotFound(path),
                other => other.into(),
            })?
        };

        let head = branch_ref(&config.initial_branch);
        let index = repo.with_repo(|r| -> StorageResult<TreeId> {
            match RefManager::resolve(r, &head)? {
                Some(commit) => tree_of(r, commit),
                None => empty_tree(r),
            }
        })?;

        debug!(path = %config.path.display(), head = %head, index = %index, "opened workspace");

        Ok(Self {
            repo,
            config,
            head: Head::Branch(head),
            index,
            models: HashMap::new(),
        })
    }

    pub fn repo(&self) -> &GitRepository {
        &self.repo
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    /// Root tree id of the index.
    pub fn index(&self) -> TreeId {
        self.index
    }

    /// The tracked branch, or `None` if detached or the branch has no
    /// commits yet.
    pub fn branch(&self) -> WorkspaceResult<Option<BranchInfo>> {
        let Head::Branch(reference) = &self.head else {
            return Ok(None);
        };

        let info = self.repo.with_repo(|r| -> StorageResult<_> {
            let Some(commit) = RefManager::resolve(r, reference)? else {
                return Ok(None);
            };
            Ok(Some(BranchInfo {
                reference: reference.clone(),
                commit,
                tree: tree_of(r, commit)?,
            }))
        })?;

        Ok(info)
    }

    /// The tree the index is compared against.
    fn base_tree(&self) -> WorkspaceResult<TreeId> {
        match &self.head {
            Head::Detached { tree } => Ok(*tree),
            Head::Branch(_) => match self.branch()? {
                Some(branch) => Ok(branch.tree),
                None => Ok(self.repo.empty_tree()?),
            },
        }
    }

    // ==================== Objects ====================

    pub fn create_blob(&self, content: impl AsRef<[u8]>) -> WorkspaceResult<BlobId> {
        Ok(self.repo.write_blob(content.as_ref())?)
    }

    pub fn get_blob(&self, id: BlobId) -> WorkspaceResult<Vec<u8>> {
        Ok(self.repo.read_blob(id)?)
    }

    /// Tree entry at `path` in the index.
    pub fn entry(&self, path: &str) -> WorkspaceResult<Option<TreeEntryInfo>> {
        let index = self.index;
        Ok(self.repo.with_repo(|r| lookup(r, index, path))?)
    }

    /// Entries of the directory at `path` in the index, in stored order.
    pub fn list(&self, path: &str) -> WorkspaceResult<Vec<TreeEntryInfo>> {
        let index = self.index;
        let listing = self.repo.with_repo(|r| -> StorageResult<_> {
            match subtree(r, index, path)? {
                Some(tree) => entries(r, tree),
                None => Err(StorageError::PathNotFound(normalize(path).to_string())),
            }
        })?;
        Ok(listing)
    }

    /// Contents of the blob at `path` in the index.
    pub fn read(&self, path: &str) -> WorkspaceResult<Option<Vec<u8>>> {
        self.read_at(self.index, path)
    }

    /// Contents of the blob at `path` in an arbitrary tree.
    pub fn read_at(&self, tree: TreeId, path: &str) -> WorkspaceResult<Option<Vec<u8>>> {
        let data = self.repo.with_repo(|r| -> StorageResult<_> {
            let Some(entry) = lookup(r, tree, path)? else {
                return Ok(None);
            };
            if entry.is_tree() {
                return Err(StorageError::UnexpectedEntryType {
                    path: path.into(),
                    expected: "blob".to_string(),
                    found: "tree".to_string(),
                });
            }
            Ok(Some(read_blob(r, BlobId::new(entry.id.raw()))?))
        })?;
        Ok(data)
    }

    /// Resolve any revision (branch, commit id, tree id) to a tree.
    pub fn resolve_tree(&self, treeish: &str) -> WorkspaceResult<TreeId> {
        let (tree, _) = self.repo.with_repo(|r| RefManager::resolve_treeish(r, treeish))?;
        Ok(tree)
    }

    // ==================== Index mutation ====================

    /// Insert `entries` into the tree at `path` and make the result the
    /// new index.
    pub fn add(&mut self, path: &str, entries: &[PathEntry]) -> WorkspaceResult<()> {
        let index = self.index;
        self.index = self.repo.with_repo(|r| build_path(r, path, entries, Some(index)))?;
        Ok(())
    }

    /// Store `content` as a regular file at `path` in the index.
    pub fn add_blob(&mut self, path: &str, content: impl AsRef<[u8]>) -> WorkspaceResult<BlobId> {
        self.add_blob_with_mode(path, content, EntryMode::Blob)
    }

    pub fn add_blob_with_mode(
        &mut self,
        path: &str,
        content: impl AsRef<[u8]>,
        mode: EntryMode,
    ) -> WorkspaceResult<BlobId> {
        let path = normalize(path);
        let (parent, name) = split_path(path);
        if name.is_empty() {
            return Err(StorageError::from(InvalidNameError::InvalidPath(path.to_string())).into());
        }

        let blob = self.repo.write_blob(content.as_ref())?;
        self.add(parent, &[PathEntry::new(name, blob, mode)])?;
        Ok(blob)
    }

    /// Remove whatever lives at `path` (a file or a whole directory).
    pub fn remove(&mut self, path: &str) -> WorkspaceResult<()> {
        let index = self.index;
        self.index = self.repo.with_repo(|r| remove_path(r, path, index))?;
        Ok(())
    }

    /// Paths that differ between the branch tip and the index.
    pub fn diff(&self) -> WorkspaceResult<Vec<Change>> {
        let base = self.base_tree()?;
        let index = self.index;
        Ok(self.repo.with_repo(|r| diff_trees(r, base, index))?)
    }

    /// `true` if committing now would record something.
    pub fn has_changes(&self) -> WorkspaceResult<bool> {
        let base = self.base_tree()?;
        let index = self.index;
        Ok(self.repo.with_repo(|r| count_changes(r, base, index))? > 0)
    }

    // ==================== Commits & branches ====================

    /// Commit the index to the tracked branch.
    ///
    /// Returns `None` without touching the branch when there is nothing to
    /// commit. Author and committer default to the configured user.
    pub fn commit(
        &mut self,
        message: &str,
        author: Option<GitSignature>,
        committer: Option<GitSignature>,
    ) -> WorkspaceResult<Option<CommitId>> {
        if !self.has_changes()? {
            debug!("nothing to commit");
            return Ok(None);
        }

        let reference = match &self.head {
            Head::Branch(reference) => reference.clone(),
            Head::Detached { .. } => return Err(WorkspaceError::DetachedHead),
        };
        let parents = match self.branch()? {
            Some(branch) => vec![branch.commit],
            None => Vec::new(),
        };

        let id = self.create_commit(&reference, self.index, message, author, committer, Some(parents))?;
        Ok(Some(id))
    }

    /// Create a commit of `tree` and advance `reference` to it.
    ///
    /// When `parents` is `None` the current target of `reference`, if any,
    /// becomes the only parent. The ref update fails with a concurrent
    /// modification error if the ref no longer points at the first parent.
    pub fn create_commit(
        &self,
        reference: &str,
        tree: TreeId,
        message: &str,
        author: Option<GitSignature>,
        committer: Option<GitSignature>,
        parents: Option<Vec<CommitId>>,
    ) -> WorkspaceResult<CommitId> {
        let author = author.unwrap_or_else(|| self.config.default_user.clone());
        let committer = committer.unwrap_or_else(|| author.clone());
        let default_offset = self.config.default_tz_offset;

        let id = self.repo.with_repo(|r| -> StorageResult<_> {
            let parents = match parents {
                Some(parents) => parents,
                None => RefManager::resolve(r, reference)?.into_iter().collect(),
            };
            CommitBuilder::new(r)
                .tree(tree)
                .parents(parents)
                .message(message)
                .author(author)
                .committer(committer)
                .default_offset(default_offset)
                .update_ref(reference)
                .commit()
        })?;

        debug!(reference, commit = %id, tree = %tree, "created commit");
        Ok(id)
    }

    /// Run `f` against the workspace and commit what it changed if it
    /// succeeds.
    ///
    /// Refuses to start if the workspace already has pending changes. If
    /// `f` fails nothing is committed and its changes stay in the index.
    pub fn commit_on_success<F, T, E>(
        &mut self,
        message: &str,
        author: Option<GitSignature>,
        committer: Option<GitSignature>,
        f: F,
    ) -> Result<(T, Option<CommitId>), E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<WorkspaceError>,
    {
        if self.has_changes()? {
            return Err(WorkspaceError::pending("auto-commit").into());
        }

        let value = f(self)?;
        let commit = self.commit(message, author, committer)?;
        Ok((value, commit))
    }

    /// Create a branch at `start_point` (any revision; defaults to the
    /// tracked branch). Returns the new branch's full ref name.
    pub fn create_branch(&self, name: &str, start_point: Option<&str>) -> WorkspaceResult<String> {
        let start = match (start_point, &self.head) {
            (Some(start), _) => start.to_string(),
            (None, Head::Branch(reference)) => reference.clone(),
            (None, Head::Detached { .. }) => return Err(WorkspaceError::DetachedHead),
        };

        let reference = self.repo.with_repo(|r| RefManager::create_branch(r, name, &start))?;
        debug!(branch = %reference, start_point = %start, "created branch");
        Ok(reference)
    }

    /// Switch to an existing branch. Only allowed with no pending changes.
    pub fn set_branch(&mut self, name: &str) -> WorkspaceResult<()> {
        if self.has_changes()? {
            return Err(WorkspaceError::pending("switch branches"));
        }

        let reference = branch_ref(name);
        if self.repo.with_repo(|r| RefManager::resolve(r, &reference))?.is_none() {
            return Err(StorageError::RefNotFound(reference).into());
        }

        self.update_index(&reference)
    }

    /// Replace the index with the tree of `treeish`.
    ///
    /// A `refs/heads/...` name makes the workspace track that branch;
    /// anything else detaches it. Only allowed with no pending changes.
    pub fn update_index(&mut self, treeish: &str) -> WorkspaceResult<()> {
        if self.has_changes()? {
            return Err(WorkspaceError::pending("check out a different tree"));
        }

        let tree = self.resolve_tree(treeish)?;
        self.head = if treeish.starts_with(BRANCH_REF_PREFIX) {
            Head::Branch(treeish.to_string())
        } else {
            Head::Detached { tree }
        };
        self.index = tree;

        debug!(treeish, index = %tree, "updated index");
        Ok(())
    }

    /// Commits on the tracked branch, newest first.
    pub fn history(&self, limit: Option<usize>) -> WorkspaceResult<Vec<CommitInfo>> {
        let Some(branch) = self.branch()? else {
            return Ok(Vec::new());
        };

        let commits = self.repo.with_repo(|r| -> StorageResult<Vec<_>> {
            let iter = history(r, branch.commit)?;
            match limit {
                Some(n) => iter.take(n).collect(),
                None => iter.collect(),
            }
        })?;
        Ok(commits)
    }

    // ==================== Traversal ====================

    /// Paths in the index matching a shell-style pattern.
    pub fn glob(&self, pattern: &str) -> WorkspaceResult<Vec<String>> {
        let index = self.index;
        let paths = self
            .repo
            .with_repo(|r| -> StorageResult<Vec<String>> { glob(r, index, pattern)?.collect() })?;
        Ok(paths)
    }

    /// Indented listing of the index.
    pub fn describe(&self) -> WorkspaceResult<String> {
        let index = self.index;
        Ok(self.repo.with_repo(|r| describe_tree(r, index, 2))?)
    }

    /// Every directory of the index with its subdirectories and files.
    pub fn walk(&self, topdown: bool) -> WorkspaceResult<Vec<WalkStep>> {
        let index = self.index;
        Ok(self.repo.with_repo(|r| walk(r, index, topdown))?)
    }

    /// Write the index into the repository's own INDEX file, and with
    /// `checkout` also into the working directory, so that ordinary git
    /// tools see it. Runs under the `INDEX` lock.
    pub fn sync_repo_index(&self, checkout: bool) -> WorkspaceResult<()> {
        let _guard = self.lock("INDEX")?;
        let index = self.index;

        self.repo.with_repo(|r| -> StorageResult<()> {
            let tree = r.find_tree(index.raw())?;
            let mut git_index = r.index()?;
            git_index.read_tree(&tree)?;
            git_index.write()?;
            if checkout {
                r.checkout_index(Some(&mut git_index), Some(CheckoutBuilder::new().force()))?;
            }
            Ok(())
        })?;

        debug!(index = %index, checkout, "synced repository index");
        Ok(())
    }

    // ==================== Models ====================

    /// Register a model with this workspace and get a handle for it.
    ///
    /// Registering a name twice keeps the first schema.
    pub fn register_model<T: Record>(&mut self, schema: ModelSchema) -> ModelHandle<T> {
        let name = schema.name().to_string();
        let schema = self
            .models
            .entry(name)
            .or_insert_with(|| Arc::new(schema))
            .clone();
        ModelHandle::new(schema)
    }

    /// A registered model schema by name.
    pub fn model(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.models.get(name).cloned()
    }
}
