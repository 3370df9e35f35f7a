//!  Commit creation, history traversal and tree diffing
//!
//! commits are the only thing that moves a branch. In gitmodel:
//! - the workspace index is turned into a commit only when it differs
//!   from the branch tip
//! - the branch ref is advanced by the object database in the same call
//!   that writes the commit, so a branch that moved in between is
//!   detected instead of silently overwritten
//!
//! diffs are computed tree-to-tree and never materialise a textual patch

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, Diff, ErrorCode, Repository, Revwalk, Sort};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Change, ChangeStatus, CommitId, GitSignature, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    /// commit (committer) time
    pub timestamp: DateTime<Utc>,
    /// committer UTC offset in minutes
    pub offset_minutes: i32,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let committer = commit.committer();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            committer_name: committer.name().unwrap_or("Unknown").to_string(),
            committer_email: committer.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
            offset_minutes: time.offset_minutes(),
        }
    }

    /// check if this is the first commit of its branch
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    author: GitSignature,
    committer: Option<GitSignature>,
    default_offset: Option<i32>,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            author: GitSignature::gitmodel(),
            committer: None,
            default_offset: None,
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set all parents at once
    pub fn parents(mut self, parents: Vec<CommitId>) -> Self {
        self.parents = parents;
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author signature
    pub fn author(mut self, author: GitSignature) -> Self {
        self.author = author;
        self
    }

    /// set the committer signature; defaults to the author
    pub fn committer(mut self, committer: GitSignature) -> Self {
        self.committer = Some(committer);
        self
    }

    /// UTC offset used for signatures that don't carry their own
    pub fn default_offset(mut self, offset: Option<i32>) -> Self {
        self.default_offset = offset;
        self
    }

    /// advance a ref to this commit
    ///
    /// the ref must either not exist yet or point at the first parent
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let author = self.author.to_git2_signature(self.default_offset)?;
        let committer = match &self.committer {
            Some(committer) => committer.to_git2_signature(self.default_offset)?,
            None => author.clone(),
        };

        // collect parent commits
        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self
            .repo
            .commit(
                self.update_ref.as_deref(),
                &author,
                &committer,
                &self.message,
                &tree,
                &parent_refs,
            )
            .map_err(|e| match (&self.update_ref, e.code()) {
                (Some(reference), ErrorCode::Modified) => StorageError::ConcurrentModification {
                    reference: reference.clone(),
                },
                _ => StorageError::Git(e),
            })?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo.find_commit(id.raw())?;
    Ok(CommitInfo::from_git2(&commit))
}

/// the root tree of a commit
pub fn tree_of(repo: &Repository, id: CommitId) -> StorageResult<TreeId> {
    let commit = repo.find_commit(id.raw())?;
    Ok(TreeId::new(commit.tree_id()))
}

fn diff<'repo>(repo: &'repo Repository, old: TreeId, new: TreeId) -> StorageResult<Diff<'repo>> {
    let old_tree = repo.find_tree(old.raw())?;
    let new_tree = repo.find_tree(new.raw())?;
    Ok(repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?)
}

/// compute the changed paths between two trees
pub fn diff_trees(repo: &Repository, old: TreeId, new: TreeId) -> StorageResult<Vec<Change>> {
    if old == new {
        return Ok(Vec::new());
    }
    let diff = diff(repo, old, new)?;
    Ok(extract_changes_from_diff(&diff))
}

/// number of changed paths between two trees
pub fn count_changes(repo: &Repository, old: TreeId, new: TreeId) -> StorageResult<usize> {
    // equal ids mean equal content; skip the diff entirely
    if old == new {
        return Ok(0);
    }
    Ok(diff(repo, old, new)?.deltas().len())
}

/// compute changes from a diff
fn extract_changes_from_diff(diff: &Diff<'_>) -> Vec<Change> {
    diff.deltas()
        .map(|delta| {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(PathBuf::from)
                .unwrap_or_default();

            let status = match delta.status() {
                Delta::Added => ChangeStatus::Added,
                Delta::Deleted => ChangeStatus::Deleted,
                Delta::Modified => ChangeStatus::Modified,
                Delta::Renamed => ChangeStatus::Renamed,
                Delta::Copied => ChangeStatus::Copied,
                _ => ChangeStatus::Other,
            };

            Change { path, status }
        })
        .collect()
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: CommitId) -> StorageResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.push(start.raw())?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

        Ok(Self { repo, revwalk })
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(StorageError::Git(e))),
            },
            Err(e) => Some(Err(StorageError::Git(e))),
        }
    }
}

/// get history for a commit
pub fn history(repo: &Repository, start: CommitId) -> StorageResult<HistoryIterator<'_>> {
    HistoryIterator::new(repo, start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::blob::write_blob;
    use crate::storage::tree::{build_path, empty_tree};
    use crate::storage::types::PathEntry;
    use tempfile::TempDir;

    const MASTER: &str = "refs/heads/master";

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn tree_with(repo: &Repository, path: &str, content: &[u8], root: Option<TreeId>) -> TreeId {
        let blob = write_blob(repo, content).unwrap();
        let (parent, name) = crate::storage::tree::split_path(path);
        build_path(repo, parent, &[PathEntry::blob(name, blob)], root).unwrap()
    }

    #[test]
    fn test_initial_commit_updates_ref() {
        let (_dir, repo) = setup_repo();
        let tree = tree_with(&repo, "a/b.txt", b"hi", None);

        let id = CommitBuilder::new(&repo)
            .tree(tree)
            .message("Initial")
            .update_ref(MASTER)
            .commit()
            .unwrap();

        let info = get_commit(&repo, id).unwrap();
        assert!(info.is_root());
        assert_eq!(info.tree_id, tree);
        assert_eq!(info.author_name, "gitmodel");
        assert_eq!(repo.refname_to_id(MASTER).unwrap(), id.raw());
    }

    #[test]
    fn test_author_and_committer() {
        let (_dir, repo) = setup_repo();
        let tree = empty_tree(&repo).unwrap();

        let author = GitSignature::new("Tester Test", "test@example.com").at(1_000_000);
        let committer = GitSignature::new("Joe Committer", "joe@example.com")
            .at(1_000_100)
            .with_offset(-300);

        let id = CommitBuilder::new(&repo)
            .tree(tree)
            .message("signed")
            .author(author)
            .committer(committer)
            .default_offset(Some(60))
            .commit()
            .unwrap();

        let info = get_commit(&repo, id).unwrap();
        assert_eq!(info.author_email, "test@example.com");
        assert_eq!(info.committer_name, "Joe Committer");
        assert_eq!(info.timestamp.timestamp(), 1_000_100);
        assert_eq!(info.offset_minutes, -300);

        let commit = repo.find_commit(id.raw()).unwrap();
        assert_eq!(commit.author().when().offset_minutes(), 60);
    }

    #[test]
    fn test_stale_parent_is_concurrent_modification() {
        let (_dir, repo) = setup_repo();
        let t1 = tree_with(&repo, "x", b"1", None);
        let t2 = tree_with(&repo, "x", b"2", None);
        let t3 = tree_with(&repo, "x", b"3", None);

        let c1 = CommitBuilder::new(&repo).tree(t1).update_ref(MASTER).commit().unwrap();
        let c2 = CommitBuilder::new(&repo)
            .tree(t2)
            .parent(c1)
            .update_ref(MASTER)
            .commit()
            .unwrap();

        // another writer still thinks c1 is the tip
        let result = CommitBuilder::new(&repo)
            .tree(t3)
            .parent(c1)
            .update_ref(MASTER)
            .commit();
        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));
        assert_eq!(repo.refname_to_id(MASTER).unwrap(), c2.raw());
    }

    #[test]
    fn test_history_iteration() {
        let (_dir, repo) = setup_repo();
        let tree = empty_tree(&repo).unwrap();

        let c1 = CommitBuilder::new(&repo).tree(tree).message("First").commit().unwrap();
        let c2 = CommitBuilder::new(&repo)
            .tree(tree)
            .parent(c1)
            .message("Second")
            .commit()
            .unwrap();
        let c3 = CommitBuilder::new(&repo)
            .tree(tree)
            .parent(c2)
            .message("Third\n\nwith body")
            .commit()
            .unwrap();

        let commits: Vec<_> = history(&repo, c3).unwrap().collect::<Result<_, _>>().unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].id, c3);
        assert_eq!(commits[0].summary(), "Third");
        assert_eq!(commits[1].id, c2);
        assert_eq!(commits[2].id, c1);
        assert_eq!(commits[1].first_parent(), Some(c1));
    }

    #[test]
    fn test_diff_trees() {
        let (_dir, repo) = setup_repo();
        let t1 = tree_with(&repo, "people/1/data.json", b"{}", None);
        let t2 = tree_with(&repo, "people/2/data.json", b"{}", Some(t1));
        let t3 = tree_with(&repo, "people/1/data.json", b"{\"a\":1}", Some(t2));

        let changes = diff_trees(&repo, t1, t2).unwrap();
        assert_eq!(
            changes,
            vec![Change {
                path: PathBuf::from("people/2/data.json"),
                status: ChangeStatus::Added,
            }]
        );

        let changes = diff_trees(&repo, t2, t3).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, ChangeStatus::Modified);

        let empty = empty_tree(&repo).unwrap();
        assert_eq!(count_changes(&repo, empty, t3).unwrap(), 2);
        assert_eq!(count_changes(&repo, t3, t3).unwrap(), 0);
        assert!(diff_trees(&repo, t3, t3).unwrap().is_empty());
    }

    #[test]
    fn test_tree_of() {
        let (_dir, repo) = setup_repo();
        let tree = tree_with(&repo, "f", b"x", None);
        let id = CommitBuilder::new(&repo).tree(tree).commit().unwrap();
        assert_eq!(tree_of(&repo, id).unwrap(), tree);
    }
}
