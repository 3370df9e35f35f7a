//! tree path building.
//!
//! in Git, a tree is an immutable directory. Changing one file deep inside
//! a tree means writing a new tree for its directory, then a new tree for
//! each ancestor up to the root. This module does that rebuild without
//! touching any ref; the caller decides what to do with the new root.
//!
//! Trees off the rebuilt path are reused by id, so two roots built from
//! each other share every untouched subtree.

use std::path::Path;

use git2::{ObjectType, Repository, Tree};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{EntryMode, ObjectId, PathEntry, TreeId};

/// A single entry found in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntryInfo {
    pub name: String,
    pub id: ObjectId,
    pub mode: EntryMode,
}

impl TreeEntryInfo {
    fn from_git2(entry: &git2::TreeEntry<'_>) -> Self {
        Self {
            name: entry.name().unwrap_or_default().to_string(),
            id: ObjectId::new(entry.id()),
            mode: EntryMode::from_raw(entry.filemode()).unwrap_or(EntryMode::Blob),
        }
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// strip leading and trailing separators
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// split a normalized path into `(parent, name)`
///
/// `"foo/bar/baz"` -> `("foo/bar", "baz")`, `"foo"` -> `("", "foo")`
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

/// write the empty tree and return its id
pub fn empty_tree(repo: &Repository) -> StorageResult<TreeId> {
    let oid = repo.treebuilder(None)?.write()?;
    Ok(TreeId::new(oid))
}

/// look up the entry at `path` inside `root`
///
/// returns `None` for the empty path and for paths that don't exist
pub fn lookup(repo: &Repository, root: TreeId, path: &str) -> StorageResult<Option<TreeEntryInfo>> {
    let path = normalize(path);
    if path.is_empty() {
        return Ok(None);
    }
    let tree = repo.find_tree(root.raw())?;
    match tree.get_path(Path::new(path)) {
        Ok(entry) => Ok(Some(TreeEntryInfo::from_git2(&entry))),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// list the entries of a tree in stored order
pub fn entries(repo: &Repository, tree: TreeId) -> StorageResult<Vec<TreeEntryInfo>> {
    let tree = repo.find_tree(tree.raw())?;
    Ok(tree.iter().map(|e| TreeEntryInfo::from_git2(&e)).collect())
}

/// the subtree at `path` inside `root`, if one exists there
///
/// fails if something other than a tree lives at `path`
fn subtree_at<'repo>(
    repo: &'repo Repository,
    root: &Tree<'repo>,
    path: &str,
) -> StorageResult<Option<Tree<'repo>>> {
    let entry = match root.get_path(Path::new(path)) {
        Ok(entry) => entry,
        Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if entry.kind() != Some(ObjectType::Tree) {
        return Err(StorageError::UnexpectedEntryType {
            path: path.into(),
            expected: "tree (directory)".to_string(),
            found: format!("{:?}", entry.kind()),
        });
    }

    Ok(Some(repo.find_tree(entry.id())?))
}

/// subtree id at `path` inside `root` (the root itself for the empty path)
pub fn subtree(repo: &Repository, root: TreeId, path: &str) -> StorageResult<Option<TreeId>> {
    let path = normalize(path);
    if path.is_empty() {
        return Ok(Some(root));
    }
    let root = repo.find_tree(root.raw())?;
    Ok(subtree_at(repo, &root, path)?.map(|t| TreeId::new(t.id())))
}

/// Build out a tree path, starting at the leaf and rewriting every tree up
/// the parent chain, resulting in a (potentially) new root tree id.
///
/// `entries` are inserted into (or replace entries of) the tree at `path`.
/// The tree at `path` in `root`, if any, is the starting point, so its
/// other entries survive. When `root` is `None` the build starts from an
/// empty tree. `root` itself is never modified.
pub fn build_path(
    repo: &Repository,
    path: &str,
    entries: &[PathEntry],
    root: Option<TreeId>,
) -> StorageResult<TreeId> {
    let root = match root {
        Some(id) => repo.find_tree(id.raw())?,
        None => repo.find_tree(empty_tree(repo)?.raw())?,
    };

    let mut path = normalize(path).to_string();
    let mut entries = entries.to_vec();

    loop {
        let found;
        let existing = if path.is_empty() {
            Some(&root)
        } else {
            found = subtree_at(repo, &root, &path)?;
            found.as_ref()
        };

        let mut builder = repo.treebuilder(existing)?;
        for entry in &entries {
            builder.insert(entry.name.as_str(), entry.id.raw(), entry.mode.into())?;
        }
        let oid = builder.write()?;

        if path.is_empty() {
            return Ok(TreeId::new(oid));
        }

        // the freshly written tree becomes the single entry of its parent
        let (parent, name) = split_path(&path);
        let parent = parent.to_string();
        entries = vec![PathEntry::tree(name, TreeId::new(oid))];
        path = parent;
    }
}

/// Remove the entry at `path` and rebuild the tree up to the root.
///
/// Fails with `PathNotFound` if nothing lives at `path`.
pub fn remove_path(repo: &Repository, path: &str, root: TreeId) -> StorageResult<TreeId> {
    let path = normalize(path);
    if path.is_empty() {
        return Err(StorageError::PathNotFound(path.to_string()));
    }

    let root_tree = repo.find_tree(root.raw())?;
    let (parent, name) = split_path(path);

    let parent_tree = if parent.is_empty() {
        root_tree
    } else {
        subtree_at(repo, &root_tree, parent)?
            .ok_or_else(|| StorageError::PathNotFound(path.to_string()))?
    };

    if parent_tree.get_name(name).is_none() {
        return Err(StorageError::PathNotFound(path.to_string()));
    }

    let mut builder = repo.treebuilder(Some(&parent_tree))?;
    builder.remove(name)?;
    let oid = builder.write()?;

    if parent.is_empty() {
        return Ok(TreeId::new(oid));
    }

    let (grandparent, parent_name) = split_path(parent);
    build_path(
        repo,
        grandparent,
        &[PathEntry::tree(parent_name, TreeId::new(oid))],
        Some(root),
    )
}
