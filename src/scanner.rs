use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{HumanCount, ProgressBar};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{DupError, Result};
use crate::signal::CancelFlag;

/// Collects every regular file under `root`.
///
/// Symbolic links are neither followed nor returned. Entries that cannot be
/// read below the root are logged and skipped; an unreadable root is an
/// error.
pub fn walk_files(root: &Path, cancel: &CancelFlag, progress: &ProgressBar) -> Result<Vec<PathBuf>> {
    info!("Scanning {}", root.display());
    progress.set_message("Scanning files...");
    progress.enable_steady_tick(Duration::from_millis(100));

    let mut files = Vec::new();
    let mut total_dirs = 0u64;
    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            progress.finish_and_clear();
            return Err(DupError::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                progress.finish_and_clear();
                return Err(DupError::Walk {
                    path: root.to_path_buf(),
                    source: e.into(),
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            total_dirs += 1;
        } else if file_type.is_file() {
            debug!("Found file: '{}'", entry.path().display());
            files.push(entry.into_path());
            progress.set_message(format!("Scanning files... {} found", files.len()));
        }
    }
    progress.finish_and_clear();

    info!(
        "Found {} files in {} directories",
        HumanCount(files.len() as u64),
        HumanCount(total_dirs)
    );
    Ok(files)
}

/// Reads one path per line, ignoring blank lines.
///
/// Lines are taken as raw bytes, so paths that are not valid UTF-8 come
/// through unchanged on Unix.
pub fn read_path_lines<R: BufRead>(reader: R) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            paths.push(path_from_bytes(line));
        }
    }
    debug!("Read {} paths from input", paths.len());
    Ok(paths)
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_walk_returns_only_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "b").unwrap();
        fs::write(dir.path().join("sub/deeper/c.txt"), "c").unwrap();

        let mut files =
            walk_files(dir.path(), &CancelFlag::new(), &ProgressBar::hidden()).unwrap();
        files.sort();
        assert_eq!(
            files,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("sub/b.txt"),
                dir.path().join("sub/deeper/c.txt"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("real.txt");
        fs::write(&target, "data").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let files = walk_files(dir.path(), &CancelFlag::new(), &ProgressBar::hidden()).unwrap();
        assert_eq!(files, vec![target]);
    }

    #[test]
    fn test_walk_missing_root() {
        let dir = tempdir().unwrap();
        let err = walk_files(
            &dir.path().join("absent"),
            &CancelFlag::new(),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(matches!(err, DupError::Walk { .. }));
    }

    #[test]
    fn test_walk_cancelled() {
        let dir = tempdir().unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = walk_files(dir.path(), &cancel, &ProgressBar::hidden()).unwrap_err();
        assert!(matches!(err, DupError::Cancelled));
    }

    #[test]
    fn test_read_path_lines() {
        let input = Cursor::new("/tmp/a\n\n/tmp/b c\r\n   \n");
        let paths = read_path_lines(input).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b c")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_path_lines_keeps_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/data").join(OsStr::from_bytes(b"caf\xe9.txt"));
        assert!(path.to_str().is_none());

        let mut input = path.as_os_str().as_bytes().to_vec();
        input.extend_from_slice(b"\r\n");
        let paths = read_path_lines(Cursor::new(input)).unwrap();
        assert_eq!(paths, vec![path]);
    }
}
