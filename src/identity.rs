use std::fs::File;
use std::hash::Hasher as _;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use twox_hash::XxHash64;

use crate::error::{DupError, Result};

/// Default number of leading bytes digested for the screening tier.
pub const DEFAULT_PREFIX_BYTES: usize = 4096;

/// One file under consideration.
///
/// `content_digest` stays `None` until the confirmation stage fills it, and is
/// only ever filled for records that survived prefix pruning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub prefix_digest: u64,
    pub content_digest: Option<u64>,
}

impl FileRecord {
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the record with its content digest set.
    pub fn confirmed(mut self, content_digest: u64) -> Self {
        self.content_digest = Some(content_digest);
        self
    }
}

/// XxHash64 with a zero seed, used at both tiers.
pub fn digest(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

/// Builds the identity record of `path` by reading at most `prefix_bytes`
/// bytes from the start of the file.
///
/// Files shorter than `prefix_bytes` are digested over whatever they hold.
pub fn extract(path: &Path, prefix_bytes: usize) -> Result<FileRecord> {
    let file = File::open(path).map_err(|e| DupError::access(path, e))?;
    let size = file
        .metadata()
        .map_err(|e| DupError::access(path, e))?
        .len();

    let mut prefix = Vec::with_capacity(prefix_bytes.min(size as usize));
    file.take(prefix_bytes as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| DupError::access(path, e))?;

    let prefix_digest = digest(&prefix);
    debug!(
        "Identity of '{}': {} bytes, prefix {:016x} over {} bytes",
        path.display(),
        size,
        prefix_digest,
        prefix.len()
    );

    Ok(FileRecord {
        path: path.to_path_buf(),
        size,
        prefix_digest,
        content_digest: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_extract_short_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.txt");
        fs::write(&path, b"hello").unwrap();

        let record = extract(&path, DEFAULT_PREFIX_BYTES).unwrap();
        assert_eq!(record.size, 5);
        assert_eq!(record.prefix_digest, digest(b"hello"));
        assert_eq!(record.content_digest, None);
    }

    #[test]
    fn test_extract_reads_only_prefix() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"abcdXXXX").unwrap();
        fs::write(&b, b"abcdYYYY").unwrap();

        let ra = extract(&a, 4).unwrap();
        let rb = extract(&b, 4).unwrap();
        assert_eq!(ra.prefix_digest, rb.prefix_digest);
        assert_eq!(ra.prefix_digest, digest(b"abcd"));
    }

    #[test]
    fn test_extract_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let record = extract(&path, DEFAULT_PREFIX_BYTES).unwrap();
        assert!(record.is_empty());
        assert_eq!(record.prefix_digest, digest(&[]));
    }

    #[test]
    fn test_extract_missing_file_is_access_error() {
        let dir = tempdir().unwrap();
        let err = extract(&dir.path().join("nope"), 16).unwrap_err();
        assert!(matches!(err, DupError::Access { .. }));
    }

    #[test]
    fn test_confirmed_sets_content_digest() {
        let record = FileRecord {
            path: PathBuf::from("x"),
            size: 1,
            prefix_digest: 7,
            content_digest: None,
        };
        assert_eq!(record.confirmed(9).content_digest, Some(9));
    }
}
