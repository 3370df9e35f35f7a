//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;
use std::path::PathBuf;

use git2::{FileMode, Oid};

/// Any object in the object database (blob, tree or commit).
///
/// Tree entries can point at either blobs or trees, so the path builder
/// works in terms of this untyped id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) Oid);

impl ObjectId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse an ObjectId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(ObjectId)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BlobId> for ObjectId {
    fn from(id: BlobId) -> Self {
        ObjectId(id.0)
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TreeId> for ObjectId {
    fn from(id: TreeId) -> Self {
        ObjectId(id.0)
    }
}

/// File mode of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EntryMode {
    /// regular file
    #[default]
    Blob,
    /// executable file
    BlobExecutable,
    /// symbolic link
    Link,
    /// subdirectory
    Tree,
    /// submodule
    Commit,
}

impl EntryMode {
    /// map a raw git filemode back to an EntryMode
    pub(crate) fn from_raw(mode: i32) -> Option<Self> {
        match mode {
            m if m == i32::from(FileMode::Blob) => Some(Self::Blob),
            m if m == i32::from(FileMode::BlobExecutable) => Some(Self::BlobExecutable),
            m if m == i32::from(FileMode::Link) => Some(Self::Link),
            m if m == i32::from(FileMode::Tree) => Some(Self::Tree),
            m if m == i32::from(FileMode::Commit) => Some(Self::Commit),
            _ => None,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }
}

impl From<EntryMode> for FileMode {
    fn from(mode: EntryMode) -> Self {
        match mode {
            EntryMode::Blob => FileMode::Blob,
            EntryMode::BlobExecutable => FileMode::BlobExecutable,
            EntryMode::Link => FileMode::Link,
            EntryMode::Tree => FileMode::Tree,
            EntryMode::Commit => FileMode::Commit,
        }
    }
}

impl From<EntryMode> for i32 {
    fn from(mode: EntryMode) -> Self {
        FileMode::from(mode).into()
    }
}

/// A `(name, object, mode)` triple to insert into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub name: String,
    pub id: ObjectId,
    pub mode: EntryMode,
}

impl PathEntry {
    pub fn new(name: impl Into<String>, id: impl Into<ObjectId>, mode: EntryMode) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            mode,
        }
    }

    /// a regular file entry
    pub fn blob(name: impl Into<String>, id: BlobId) -> Self {
        Self::new(name, id, EntryMode::Blob)
    }

    /// a subdirectory entry
    pub fn tree(name: impl Into<String>, id: TreeId) -> Self {
        Self::new(name, id, EntryMode::Tree)
    }
}

/// A validated record key.
///
/// record keys are used as directory names, so they are restricted to a
/// safe character set. They are typically ids chosen by the application
/// or generated ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidNameError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Validate a record key.
    fn validate(key: &str) -> Result<(), InvalidNameError> {
        if key.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if key.len() > 128 {
            return Err(InvalidNameError::TooLong(key.len()));
        }

        for (i, c) in key.chars().enumerate() {
            // alphanumeric, underscore, hyphen allowed
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }

    /// Generate a new ULID-based record key.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Namespace under which advisory locks live.
pub const LOCK_REF_PREFIX: &str = "refs/locks/";

/// Namespace under which branches live.
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// full ref name for a branch short name ("main" -> "refs/heads/main")
pub fn branch_ref(name: &str) -> String {
    if name.starts_with(BRANCH_REF_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", BRANCH_REF_PREFIX, name)
    }
}

/// full ref name for a lock id, validated against git's ref name rules
pub fn lock_ref(id: &str) -> Result<String, InvalidNameError> {
    if id.is_empty() {
        return Err(InvalidNameError::Empty);
    }
    if id.starts_with('/') || id.ends_with('/') {
        return Err(InvalidNameError::InvalidPath(id.to_string()));
    }
    let name = format!("{}{}", LOCK_REF_PREFIX, id);
    match git2::Reference::normalize_name(&name, git2::ReferenceFormat::NORMAL) {
        Ok(normalized) if normalized == name => Ok(name),
        _ => Err(InvalidNameError::InvalidPath(id.to_string())),
    }
}

/// git signature (author/committer info)
///
/// `time` and `offset` are optional: a missing time means "now", a
/// missing offset falls back to the configured default and then to the
/// local timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
    /// seconds since the unix epoch
    pub time: Option<i64>,
    /// offset from UTC in minutes
    pub offset: Option<i32>,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time: None,
            offset: None,
        }
    }

    /// default signature for gitmodel operations
    pub fn gitmodel() -> Self {
        Self::new("gitmodel", "gitmodel@local")
    }

    /// pin the signature to a timestamp
    pub fn at(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// pin the signature to a UTC offset (minutes)
    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// resolve the timestamp and offset, returning `(seconds, offset_minutes)`
    pub fn resolve_time(&self, default_offset: Option<i32>) -> (i64, i32) {
        let time = self.time.unwrap_or_else(|| chrono::Utc::now().timestamp());
        let offset = self
            .offset
            .or(default_offset)
            .unwrap_or_else(|| local_offset_minutes(time));
        (time, offset)
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(
        &self,
        default_offset: Option<i32>,
    ) -> Result<git2::Signature<'static>, git2::Error> {
        let (time, offset) = self.resolve_time(default_offset);
        git2::Signature::new(&self.name, &self.email, &git2::Time::new(time, offset))
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::gitmodel()
    }
}

/// local UTC offset (in minutes) in effect at the given timestamp
fn local_offset_minutes(time: i64) -> i32 {
    use chrono::{Local, Offset, TimeZone};

    Local
        .timestamp_opt(time, 0)
        .single()
        .map(|dt| dt.offset().fix().local_minus_utc() / 60)
        .unwrap_or(0)
}

/// error type for invalid names (record keys, branches, locks)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}

/// represents a change in a diff between trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub status: ChangeStatus,
}

/// the type of change in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Other,
}
