//! Blob operations.
//!
//! Blobs are opaque byte strings here. What goes inside them (record
//! payloads, lock markers) is decided by the layers above.

use git2::Repository;

use crate::storage::error::StorageResult;
use crate::storage::types::BlobId;

/// write raw bytes as a blob
///
/// returns the blob ID (SHA-1 hash of the content); identical content
/// always yields the same id
pub fn write_blob(repo: &Repository, content: &[u8]) -> StorageResult<BlobId> {
    let oid = repo.blob(content)?;
    Ok(BlobId::new(oid))
}

/// read a blob's content from the repository
pub fn read_blob(repo: &Repository, blob_id: BlobId) -> StorageResult<Vec<u8>> {
    let blob = repo.find_blob(blob_id.raw())?;
    Ok(blob.content().to_vec())
}

/// the empty blob, used as the target of lock refs
pub fn empty_blob(repo: &Repository) -> StorageResult<BlobId> {
    write_blob(repo, b"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_write_and_read() {
        let (_dir, repo) = setup_repo();
        let id = write_blob(&repo, b"hello").unwrap();
        assert_eq!(read_blob(&repo, id).unwrap(), b"hello");
    }

    #[test]
    fn test_content_addressing() {
        let (_dir, repo) = setup_repo();
        let a = write_blob(&repo, b"same").unwrap();
        let b = write_blob(&repo, b"same").unwrap();
        let c = write_blob(&repo, b"different").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_blob_id() {
        let (_dir, repo) = setup_repo();
        let id = empty_blob(&repo).unwrap();
        // well-known id of the empty blob
        assert_eq!(id.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
    }
}
