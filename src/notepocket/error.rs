use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Which entity table a missing id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Note,
    Folder,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Note => f.write_str("Note"),
            RecordKind::Folder => f.write_str("Folder"),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotesError {
    #[error("Durable storage is not supported in this environment")]
    InitializationUnsupported,

    #[error("File selection was cancelled")]
    FileSelectionCancelled,

    #[error("Database file could not be read: {0}")]
    DeserializationFailed(String),

    #[error("Failed to write database file: {0}")]
    WriteFailed(String),

    #[error("{kind} not found: {id}")]
    RecordNotFound { kind: RecordKind, id: Uuid },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Storage has not been initialized")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl NotesError {
    pub fn note_not_found(id: Uuid) -> Self {
        NotesError::RecordNotFound {
            kind: RecordKind::Note,
            id,
        }
    }

    pub fn folder_not_found(id: Uuid) -> Self {
        NotesError::RecordNotFound {
            kind: RecordKind::Folder,
            id,
        }
    }

    /// True for failures that leave `upgrade()` declined rather than broken:
    /// the application keeps running on the volatile store.
    pub fn is_declined_upgrade(&self) -> bool {
        matches!(
            self,
            NotesError::InitializationUnsupported
                | NotesError::FileSelectionCancelled
                | NotesError::DeserializationFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NotesError>;
