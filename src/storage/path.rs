//! Read-only traversal over trees: shell-style globbing, a recursive
//! textual description, and an `os.walk`-like enumeration.

use std::collections::VecDeque;

use git2::{ObjectType, Oid, Repository};
use globset::{GlobBuilder, GlobMatcher};

use crate::storage::error::StorageResult;
use crate::storage::tree::{lookup, normalize};
use crate::storage::types::TreeId;

/// true if `s` contains a wildcard character
pub fn has_magic(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// One `/`-separated piece of a glob pattern.
enum Segment {
    Literal(String),
    Pattern {
        matcher: GlobMatcher,
        /// names starting with `.` only match if the pattern does too
        match_hidden: bool,
    },
}

impl Segment {
    fn compile(segment: &str) -> StorageResult<Self> {
        if !has_magic(segment) {
            return Ok(Segment::Literal(segment.to_string()));
        }
        let matcher = GlobBuilder::new(segment)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Segment::Pattern {
            matcher,
            match_hidden: segment.starts_with('.'),
        })
    }
}

struct Frame {
    tree: Oid,
    prefix: String,
    depth: usize,
}

/// Lazy iterator over the paths of a tree matching a glob pattern.
///
/// Paths are produced in stored entry order, depth first. Directories
/// are only descended into when they can still match the rest of the
/// pattern.
pub struct Glob<'repo> {
    repo: &'repo Repository,
    segments: Vec<Segment>,
    stack: Vec<Frame>,
    ready: VecDeque<String>,
}

/// Return an iterator of the paths inside `root` matching `pattern`.
///
/// Supports `*`, `?` and `[...]` per path segment, like a shell glob run
/// against the tree instead of the filesystem. A pattern without
/// wildcards yields itself if the path exists.
pub fn glob<'repo>(repo: &'repo Repository, root: TreeId, pattern: &str) -> StorageResult<Glob<'repo>> {
    let pattern = normalize(pattern);
    let mut iter = Glob {
        repo,
        segments: Vec::new(),
        stack: Vec::new(),
        ready: VecDeque::new(),
    };

    if pattern.is_empty() {
        return Ok(iter);
    }

    if !has_magic(pattern) {
        if lookup(repo, root, pattern)?.is_some() {
            iter.ready.push_back(pattern.to_string());
        }
        return Ok(iter);
    }

    iter.segments = pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(Segment::compile)
        .collect::<StorageResult<_>>()?;
    iter.stack.push(Frame {
        tree: root.raw(),
        prefix: String::new(),
        depth: 0,
    });

    Ok(iter)
}

impl<'repo> Glob<'repo> {
    fn expand(&mut self, frame: Frame) -> StorageResult<()> {
        let tree = self.repo.find_tree(frame.tree)?;
        let last = frame.depth + 1 == self.segments.len();

        let mut matches = Vec::new();
        match &self.segments[frame.depth] {
            Segment::Literal(name) => {
                if let Some(entry) = tree.get_name(name) {
                    matches.push((name.clone(), entry.id(), entry.kind()));
                }
            }
            Segment::Pattern { matcher, match_hidden } => {
                for entry in tree.iter() {
                    let Some(name) = entry.name() else { continue };
                    if name.starts_with('.') && !match_hidden {
                        continue;
                    }
                    if matcher.is_match(name) {
                        matches.push((name.to_string(), entry.id(), entry.kind()));
                    }
                }
            }
        }

        if last {
            for (name, _, _) in matches {
                self.ready.push_back(join(&frame.prefix, &name));
            }
        } else {
            // reversed so the stack pops them in stored order
            for (name, id, kind) in matches.into_iter().rev() {
                if kind == Some(ObjectType::Tree) {
                    self.stack.push(Frame {
                        tree: id,
                        prefix: join(&frame.prefix, &name),
                        depth: frame.depth + 1,
                    });
                }
            }
        }

        Ok(())
    }
}

impl<'repo> Iterator for Glob<'repo> {
    type Item = StorageResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(path) = self.ready.pop_front() {
                return Some(Ok(path));
            }
            let frame = self.stack.pop()?;
            if let Err(e) = self.expand(frame) {
                self.stack.clear();
                return Some(Err(e));
            }
        }
    }
}

/// Recursive indented listing of a tree, directories suffixed with `/`.
///
/// ```text
/// foo/
///   bar/
///     baz/
///       qux.txt
/// ```
pub fn describe_tree(repo: &Repository, root: TreeId, indent: usize) -> StorageResult<String> {
    let mut lines = Vec::new();
    describe_into(repo, root.raw(), indent, 0, &mut lines)?;
    Ok(lines.join("\n"))
}

fn describe_into(
    repo: &Repository,
    tree: Oid,
    indent: usize,
    level: usize,
    lines: &mut Vec<String>,
) -> StorageResult<()> {
    let tree = repo.find_tree(tree)?;
    let pad = " ".repeat(indent * level);
    for entry in tree.iter() {
        let name = entry.name().unwrap_or_default();
        if entry.kind() == Some(ObjectType::Tree) {
            lines.push(format!("{}{}/", pad, name));
            describe_into(repo, entry.id(), indent, level + 1, lines)?;
        } else {
            lines.push(format!("{}{}", pad, name));
        }
    }
    Ok(())
}

/// One directory visited by [`walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkStep {
    /// path of the directory ("" for the root)
    pub path: String,
    pub tree: TreeId,
    /// names of subdirectories
    pub dirs: Vec<String>,
    /// names of everything else
    pub files: Vec<String>,
}

/// Enumerate every directory of a tree, like `os.walk`.
///
/// With `topdown` a directory is listed before its subdirectories,
/// otherwise after them.
pub fn walk(repo: &Repository, root: TreeId, topdown: bool) -> StorageResult<Vec<WalkStep>> {
    let mut steps = Vec::new();
    walk_into(repo, root, String::new(), topdown, &mut steps)?;
    Ok(steps)
}

fn walk_into(
    repo: &Repository,
    tree_id: TreeId,
    path: String,
    topdown: bool,
    steps: &mut Vec<WalkStep>,
) -> StorageResult<()> {
    let tree = repo.find_tree(tree_id.raw())?;

    let mut dirs = Vec::new();
    let mut subtrees = Vec::new();
    let mut files = Vec::new();
    for entry in tree.iter() {
        let name = entry.name().unwrap_or_default().to_string();
        if entry.kind() == Some(ObjectType::Tree) {
            subtrees.push((join(&path, &name), TreeId::new(entry.id())));
            dirs.push(name);
        } else {
            files.push(name);
        }
    }

    let step = WalkStep {
        path,
        tree: tree_id,
        dirs,
        files,
    };

    if topdown {
        steps.push(step);
        for (sub_path, sub_tree) in subtrees {
            walk_into(repo, sub_tree, sub_path, topdown, steps)?;
        }
    } else {
        for (sub_path, sub_tree) in subtrees {
            walk_into(repo, sub_tree, sub_path, topdown, steps)?;
        }
        steps.push(step);
    }

    Ok(())
}
