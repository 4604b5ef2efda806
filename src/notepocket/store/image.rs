//! Durable image encoding.
//!
//! The whole database is one JSON document:
//!
//! ```json
//! {
//!   "format": "notepocket",
//!   "version": 1,
//!   "savedAt": "2026-01-01T00:00:00Z",
//!   "folders": [ … ],
//!   "notes": [ … ]
//! }
//! ```
//!
//! Decoding is strict: anything that is not a complete image of a supported
//! version is a `DeserializationFailed` error, never an empty database.

use super::tables::Tables;
use crate::error::{NotesError, Result};
use crate::model::{Folder, Note};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const IMAGE_FORMAT: &str = "notepocket";
pub const IMAGE_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageOut<'a> {
    format: &'a str,
    version: u32,
    saved_at: DateTime<Utc>,
    folders: &'a [Folder],
    notes: &'a [Note],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageIn {
    format: String,
    version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    folders: Vec<Folder>,
    notes: Vec<Note>,
}

pub fn encode(tables: &Tables) -> Result<Vec<u8>> {
    let folders = tables.folders();
    let notes = tables.notes();
    let image = ImageOut {
        format: IMAGE_FORMAT,
        version: IMAGE_VERSION,
        saved_at: Utc::now(),
        folders: &folders,
        notes: &notes,
    };
    Ok(serde_json::to_vec_pretty(&image)?)
}

pub fn decode(bytes: &[u8]) -> Result<Tables> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(NotesError::DeserializationFailed(
            "file is empty".to_string(),
        ));
    }

    let image: ImageIn = serde_json::from_slice(bytes)
        .map_err(|e| NotesError::DeserializationFailed(format!("not a notepocket image: {}", e)))?;

    if image.format != IMAGE_FORMAT {
        return Err(NotesError::DeserializationFailed(format!(
            "unexpected image format '{}'",
            image.format
        )));
    }
    if image.version > IMAGE_VERSION {
        return Err(NotesError::DeserializationFailed(format!(
            "image version {} is newer than supported version {}",
            image.version, IMAGE_VERSION
        )));
    }

    tracing::debug!(
        folders = image.folders.len(),
        notes = image.notes.len(),
        saved_at = ?image.saved_at,
        "Decoded durable image"
    );

    Tables::from_records(image.folders, image.notes).map_err(|e| match e {
        NotesError::ValidationFailed(msg) => NotesError::DeserializationFailed(msg),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewFolder, NewNote};

    fn sample() -> Tables {
        let mut tables = Tables::new();
        let folder = tables
            .create_folder(NewFolder::new("Work", "#3b82f6"), Utc::now())
            .unwrap();
        tables
            .create_note(
                NewNote::text("A", "body").in_folder(folder.id).tagged(["t"]),
                Utc::now(),
            )
            .unwrap();
        tables
    }

    #[test]
    fn test_encode_decode_is_lossless() {
        let tables = sample();
        let bytes = encode(&tables).unwrap();
        assert_eq!(decode(&bytes).unwrap(), tables);
    }

    #[test]
    fn test_empty_file_is_an_error() {
        assert!(matches!(
            decode(b""),
            Err(NotesError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode(b"  \n"),
            Err(NotesError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(
            decode(b"SQLite format 3\0"),
            Err(NotesError::DeserializationFailed(_))
        ));
        assert!(matches!(
            decode(br#"{"notes": []}"#),
            Err(NotesError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_foreign_format_is_rejected() {
        let json = br#"{"format":"other","version":1,"folders":[],"notes":[]}"#;
        assert!(matches!(
            decode(json),
            Err(NotesError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let json = br#"{"format":"notepocket","version":99,"folders":[],"notes":[]}"#;
        assert!(matches!(
            decode(json),
            Err(NotesError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_invalid_record_is_deserialization_error() {
        let mut value: serde_json::Value =
            serde_json::from_slice(&encode(&sample()).unwrap()).unwrap();
        value["notes"][0]["title"] = serde_json::json!("");
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(NotesError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_empty_image_decodes_to_empty_tables() {
        let bytes = encode(&Tables::new()).unwrap();
        assert!(decode(&bytes).unwrap().is_empty());
    }
}
