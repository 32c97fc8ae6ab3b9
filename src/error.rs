use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the duplicate-detection engine.
///
/// Both digest tiers use a fast 64-bit non-cryptographic hash. Two files with
/// different content but equal size and equal digests at both tiers would be
/// reported as duplicates; there is no error variant for that case because it
/// cannot be detected without a byte-by-byte comparison.
#[derive(Error, Debug)]
pub enum DupError {
    /// A file could not be opened, stat'ed or read.
    #[error("cannot access '{}': {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The same path was inserted twice into one store.
    #[error("path already present: '{}'", .0.display())]
    DuplicatePath(PathBuf),

    /// A record without a content digest was offered to a content-tier store.
    #[error("record for '{}' has no content digest", .0.display())]
    MissingContentDigest(PathBuf),

    /// The directory walk could not start or descend.
    #[error("cannot walk '{}': {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("interrupted")]
    Cancelled,
}

impl DupError {
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Access {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = DupError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_error_names_path() {
        let err = DupError::access("/tmp/missing.bin", io::Error::from(io::ErrorKind::NotFound));
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.bin"));
        assert!(msg.starts_with("cannot access"));
    }

    #[test]
    fn test_duplicate_path_message() {
        let err = DupError::DuplicatePath(PathBuf::from("a.txt"));
        assert_eq!(err.to_string(), "path already present: 'a.txt'");
    }
}
