//! Workspace configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::{branch_ref, GitSignature};

/// Default time to wait for a held lock before giving up.
pub const DEFAULT_LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay between polls of a held lock.
pub const DEFAULT_LOCK_WAIT_INTERVAL: Duration = Duration::from_millis(1000);

/// Branch a workspace tracks unless told otherwise.
pub const DEFAULT_BRANCH: &str = "refs/heads/master";

/// Workspace configuration options.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Path to the git repository.
    pub path: PathBuf,
    /// Initialize the repository if it doesn't exist.
    pub create_if_missing: bool,
    /// Full ref name of the branch the workspace starts on.
    pub initial_branch: String,
    /// How long `lock` waits for a held lock.
    pub lock_wait_timeout: Duration,
    /// How often `lock` re-checks a held lock.
    pub lock_wait_interval: Duration,
    /// Author (and committer) used when a commit doesn't name one.
    pub default_user: GitSignature,
    /// UTC offset in minutes for signatures without one; `None` uses the
    /// local timezone.
    pub default_tz_offset: Option<i32>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            create_if_missing: false,
            initial_branch: DEFAULT_BRANCH.to_string(),
            lock_wait_timeout: DEFAULT_LOCK_WAIT_TIMEOUT,
            lock_wait_interval: DEFAULT_LOCK_WAIT_INTERVAL,
            default_user: GitSignature::gitmodel(),
            default_tz_offset: None,
        }
    }
}

impl WorkspaceConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set the starting branch; short names are expanded to `refs/heads/<name>`.
    pub fn initial_branch(mut self, name: &str) -> Self {
        self.initial_branch = branch_ref(name);
        self
    }

    pub fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }

    pub fn lock_wait_interval(mut self, interval: Duration) -> Self {
        self.lock_wait_interval = interval;
        self
    }

    pub fn default_user(mut self, user: GitSignature) -> Self {
        self.default_user = user;
        self
    }

    pub fn default_tz_offset(mut self, offset: Option<i32>) -> Self {
        self.default_tz_offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkspaceConfig::new("/tmp/repo");
        assert_eq!(config.path, PathBuf::from("/tmp/repo"));
        assert!(!config.create_if_missing);
        assert_eq!(config.initial_branch, "refs/heads/master");
        assert_eq!(config.lock_wait_timeout, Duration::from_secs(30));
        assert_eq!(config.lock_wait_interval, Duration::from_millis(1000));
        assert_eq!(config.default_user.name, "gitmodel");
        assert_eq!(config.default_user.email, "gitmodel@local");
        assert_eq!(config.default_tz_offset, None);
    }

    #[test]
    fn test_builder() {
        let config = WorkspaceConfig::new("repo")
            .create_if_missing(true)
            .initial_branch("main")
            .lock_wait_timeout(Duration::from_secs(1))
            .lock_wait_interval(Duration::from_millis(10))
            .default_tz_offset(Some(-300));

        assert!(config.create_if_missing);
        assert_eq!(config.initial_branch, "refs/heads/main");
        assert_eq!(config.lock_wait_timeout, Duration::from_secs(1));
        assert_eq!(config.lock_wait_interval, Duration::from_millis(10));
        assert_eq!(config.default_tz_offset, Some(-300));
    }
}
