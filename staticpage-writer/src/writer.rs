//! Atomic whole-file writer for buffered documents.
//!
//! ## `atomic_write` protocol
//!
//! 1. SHA-256 hash the document.
//! 2. Hash the current on-disk file, if any → skip if identical.
//! 3. Write to `<path>.staticpage.tmp`.
//! 4. Rename to the final path (atomic on POSIX).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, WriteError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { bytes: u64, digest: String },
    /// File already held exactly this content.
    Unchanged { digest: String },
}

impl WriteResult {
    pub fn digest(&self) -> &str {
        match self {
            WriteResult::Written { digest, .. } | WriteResult::Unchanged { digest, .. } => digest,
        }
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.staticpage.tmp", path.display()))
}

/// Atomically replace `path` with `content`.
///
/// Readers see either the previous file or the complete new one, never a
/// partial write.
pub fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, WriteError> {
    atomic_write_with_tmp(path, content, &tmp_path_for(path))
}

fn atomic_write_with_tmp(
    path: &Path,
    content: &str,
    tmp: &Path,
) -> Result<WriteResult, WriteError> {
    let digest = sha256_hex(content.as_bytes());

    match std::fs::read(path) {
        Ok(existing) if sha256_hex(&existing) == digest => {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged { digest });
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path, e)),
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        bytes: content.len() as u64,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("render-to-string.html");
        let result = atomic_write(&path, "hello").unwrap();
        assert!(matches!(result, WriteResult::Written { bytes: 5, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn second_write_same_content_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");
        let first = atomic_write(&path, "same content").unwrap();
        let second = atomic_write(&path, "same content").unwrap();
        assert!(matches!(second, WriteResult::Unchanged { .. }));
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn changed_content_replaces_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");
        atomic_write(&path, "a much longer first version").unwrap();
        let result = atomic_write(&path, "v2").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2", "no leftover bytes");
    }

    #[rstest]
    #[case::fresh(None, true)]
    #[case::same_content(Some("<p>page</p>"), false)]
    #[case::replaced(Some("<p>an older, longer page</p>"), true)]
    fn outcome_depends_on_existing_file(#[case] existing: Option<&str>, #[case] written: bool) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("render-to-string.html");
        if let Some(existing) = existing {
            fs::write(&path, existing).unwrap();
        }

        let result = atomic_write(&path, "<p>page</p>").unwrap();

        assert_eq!(matches!(result, WriteResult::Written { .. }), written);
        assert_eq!(result.digest(), sha256_hex(b"<p>page</p>"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>page</p>");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.html");
        atomic_write(&path, "data").unwrap();
        assert!(!tmp_path_for(&path).exists(), ".staticpage.tmp must be cleaned up");
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site").join("out").join("index.html");
        atomic_write(&path, "content").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("page.html");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("page.html.staticpage.tmp");

        let result = atomic_write_with_tmp(&path, "new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Privileged users may rename into read-only directories anyway.
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), ".staticpage.tmp should be cleaned up");
        }
    }
}
