//! File-system capability and file selection.
//!
//! Durable storage needs two things from the environment: the ability to read and
//! write a user-chosen file at all (the *capability probe*), and a decision about
//! *which* file (the *selection*, normally a picker dialog). Both are injected through
//! [`FileAccess`] so the upgrade logic can be exercised without a real environment.

use crate::error::{NotesError, Result};
use std::path::{Path, PathBuf};

/// What the user chose to do with the durable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// Load an existing image.
    Open(PathBuf),
    /// Start a new, empty image at this location.
    Create(PathBuf),
}

impl FileSelection {
    pub fn path(&self) -> &Path {
        match self {
            FileSelection::Open(path) | FileSelection::Create(path) => path,
        }
    }
}

pub trait FileAccess: Send + Sync {
    /// Capability probe: can this environment hold a durable file at all?
    fn is_supported(&self) -> bool;

    /// Ask for a file. Returns `FileSelectionCancelled` when the user backs out.
    fn select(&self) -> Result<FileSelection>;
}

/// Fixed-path access: open the file if it exists, otherwise create it.
#[derive(Debug, Clone)]
pub struct PathAccess {
    path: PathBuf,
}

impl PathAccess {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileAccess for PathAccess {
    fn is_supported(&self) -> bool {
        true
    }

    fn select(&self) -> Result<FileSelection> {
        if self.path.exists() {
            Ok(FileSelection::Open(self.path.clone()))
        } else {
            Ok(FileSelection::Create(self.path.clone()))
        }
    }
}

/// Access for environments without file-system support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedAccess;

impl FileAccess for UnsupportedAccess {
    fn is_supported(&self) -> bool {
        false
    }

    fn select(&self) -> Result<FileSelection> {
        Err(NotesError::InitializationUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_access_creates_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let access = PathAccess::new(&path);
        assert_eq!(access.select().unwrap(), FileSelection::Create(path.clone()));

        std::fs::write(&path, "{}").unwrap();
        assert_eq!(access.select().unwrap(), FileSelection::Open(path));
    }

    #[test]
    fn test_unsupported_access() {
        let access = UnsupportedAccess;
        assert!(!access.is_supported());
        assert!(matches!(
            access.select(),
            Err(NotesError::InitializationUnsupported)
        ));
    }
}
