//! Unified diff between two written documents.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::error::{io_err, WriteError};

/// Comparison of two documents on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDiff {
    pub left: PathBuf,
    pub right: PathBuf,
    /// Empty when the documents are byte-identical.
    pub unified_diff: String,
}

impl DocumentDiff {
    pub fn is_identical(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

fn read_document(path: &Path) -> Result<String, WriteError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(WriteError::Missing {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(io_err(path, e)),
    }
}

/// One tag per line so a diff of single-line documents stays readable.
fn split_tags(document: &str) -> String {
    document.replace("><", ">\n<")
}

/// Diff `left` against `right`. No files are written.
pub fn diff_documents(left: &Path, right: &Path) -> Result<DocumentDiff, WriteError> {
    let old = read_document(left)?;
    let new = read_document(right)?;

    let unified_diff = if old == new {
        String::new()
    } else {
        let old = split_tags(&old);
        let new = split_tags(&new);
        let old_header = left.display().to_string();
        let new_header = right.display().to_string();
        TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    };

    Ok(DocumentDiff {
        left: left.to_path_buf(),
        right: right.to_path_buf(),
        unified_diff,
    })
}
