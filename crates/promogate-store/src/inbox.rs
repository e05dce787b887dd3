//! Inbox scanning.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::StoreError;

/// Extension of proposal files.
pub const PROPOSAL_EXTENSION: &str = "md";

/// A proposal file as read at scan time.
#[derive(Debug, Clone)]
pub struct ProposalFile {
    pub path: PathBuf,
    pub name: String,
    pub modified: DateTime<Utc>,
    pub text: String,
}

/// List `*.md` files directly inside `inbox`, sorted by name, and read each
/// one. Non-UTF-8 bytes are replaced rather than rejected.
pub fn scan_inbox(inbox: &Path) -> Result<Vec<ProposalFile>, StoreError> {
    let entries = fs::read_dir(inbox).map_err(StoreError::io("reading inbox", inbox))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(StoreError::io("reading inbox", inbox))?;
        let path = entry.path();
        let is_proposal = path
            .extension()
            .is_some_and(|ext| ext == PROPOSAL_EXTENSION);
        if is_proposal && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(&path).map_err(StoreError::io("reading", &path))?;
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(StoreError::io("reading mtime of", &path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(file = %name, bytes = bytes.len(), "read proposal");
        files.push(ProposalFile {
            name,
            modified: DateTime::<Utc>::from(modified),
            text: String::from_utf8_lossy(&bytes).into_owned(),
            path,
        });
    }

    info!(inbox = %inbox.display(), count = files.len(), "scanned inbox");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_markdown_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("PRJ-B.md"), "b").unwrap();
        fs::write(dir.path().join("PRJ-A.md"), "a").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("IDEA-dir.md")).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("PRJ-C.md"), "c").unwrap();

        let files = scan_inbox(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["PRJ-A.md", "PRJ-B.md"]);
        assert_eq!(files[0].text, "a");
    }

    #[test]
    fn invalid_utf8_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("LOG-1.md"), b"approval_id: A\xff\n").unwrap();
        let files = scan_inbox(dir.path()).unwrap();
        assert!(files[0].text.starts_with("approval_id: A"));
    }

    #[test]
    fn missing_inbox_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_inbox(&dir.path().join("absent")).unwrap_err();
        assert!(err.to_string().starts_with("reading inbox"));
    }
}
