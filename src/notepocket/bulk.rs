//! Bulk export and import.
//!
//! The exchange format is a single JSON object:
//!
//! ```json
//! { "notes": [ … ], "folders": [ … ], "exportedAt": "2026-01-01T00:00:00Z", "version": "1.0" }
//! ```
//!
//! Import happens in two phases. [`ImportPayload`] checks the shape of the whole
//! payload and parses every record up front; a payload with the wrong shape is
//! rejected before anything is written. [`import`] then replays folders and notes
//! through the adapter with fresh ids, skipping (and counting) records that fail,
//! and writes the result once.

use crate::adapter::StorageAdapter;
use crate::error::{NotesError, Result};
use crate::model::{Attachment, EmbeddedImage, Folder, NewFolder, NewNote, Note, NoteType};
use crate::replay::{record_key, Replayer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

impl ExportData {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported_notes: usize,
    pub imported_folders: usize,
    pub skipped_notes: usize,
    pub skipped_folders: usize,
    /// The records are in memory but the durable write failed.
    pub write_pending: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct FolderRecord {
    #[serde(default)]
    id: Option<Value>,
    name: String,
    color: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteRecord {
    title: String,
    content: String,
    #[serde(rename = "type")]
    note_type: NoteType,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    folder_id: Option<Value>,
    #[serde(default)]
    is_favorite: bool,
    #[serde(flatten)]
    attachment: Option<Attachment>,
    #[serde(default)]
    embedded_images: Vec<EmbeddedImage>,
}

impl NoteRecord {
    fn to_new(&self) -> NewNote {
        NewNote {
            title: self.title.clone(),
            content: self.content.clone(),
            note_type: self.note_type,
            tags: self.tags.clone(),
            folder_id: None,
            is_favorite: self.is_favorite,
            attachment: self.attachment.clone(),
            embedded_images: self.embedded_images.clone(),
        }
    }
}

/// A structurally valid import payload, parsed and ready to replay.
#[derive(Debug, Clone, Default)]
pub struct ImportPayload {
    folders: Vec<FolderRecord>,
    notes: Vec<NoteRecord>,
    malformed_folders: usize,
    malformed_notes: usize,
}

impl ImportPayload {
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| NotesError::ValidationFailed(format!("import is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_export(data: &ExportData) -> Result<Self> {
        Self::from_value(serde_json::to_value(data)?)
    }

    /// Check the payload shape and parse every record.
    ///
    /// The payload must be an object with `notes` and `folders` arrays. Individual
    /// records missing required fields are dropped here and reported as skipped.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(NotesError::ValidationFailed(
                "import payload must be a JSON object".to_string(),
            ));
        };
        let raw_folders = take_array(&mut map, "folders")?;
        let raw_notes = take_array(&mut map, "notes")?;

        let mut payload = Self::default();

        for (index, raw) in raw_folders.into_iter().enumerate() {
            match serde_json::from_value::<FolderRecord>(raw) {
                Ok(record) => payload.folders.push(record),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed folder record");
                    payload.malformed_folders += 1;
                }
            }
        }

        for (index, raw) in raw_notes.into_iter().enumerate() {
            match serde_json::from_value::<NoteRecord>(raw) {
                Ok(record) => payload.notes.push(record),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed note record");
                    payload.malformed_notes += 1;
                }
            }
        }

        Ok(payload)
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }
}

fn take_array(map: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>> {
    match map.remove(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(NotesError::ValidationFailed(format!(
            "`{}` must be an array",
            key
        ))),
        None => Err(NotesError::ValidationFailed(format!(
            "import payload is missing `{}`",
            key
        ))),
    }
}

pub fn export(adapter: &StorageAdapter) -> Result<ExportData> {
    let (folders, notes) = adapter.snapshot()?;
    Ok(ExportData {
        notes,
        folders,
        exported_at: Utc::now(),
        version: EXPORT_VERSION.to_string(),
    })
}

/// Replay a parsed payload through the adapter. Folders first, then notes.
///
/// The records are written in one batch and flushed once. If that flush fails the
/// records stay in memory, still count as imported, and `write_pending` is set; the
/// next successful flush persists them.
pub fn import(adapter: &StorageAdapter, payload: &ImportPayload) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        skipped_folders: payload.malformed_folders,
        skipped_notes: payload.malformed_notes,
        ..ImportSummary::default()
    };

    adapter.batch(|store| {
        let mut replayer = Replayer::new(store);

        for record in &payload.folders {
            let foreign_id = record.id.as_ref().and_then(record_key);
            let folder = NewFolder::new(record.name.clone(), record.color.clone());
            match replayer.folder(foreign_id.as_deref(), folder) {
                Ok(_) => summary.imported_folders += 1,
                Err(e) => {
                    warn!(name = %record.name, error = %e, "Skipping folder on import");
                    summary.skipped_folders += 1;
                }
            }
        }

        for record in &payload.notes {
            let foreign_folder = record.folder_id.as_ref().and_then(record_key);
            match replayer.note(foreign_folder.as_deref(), record.to_new()) {
                Ok(_) => summary.imported_notes += 1,
                Err(e) => {
                    warn!(title = %record.title, error = %e, "Skipping note on import");
                    summary.skipped_notes += 1;
                }
            }
        }

        if replayer.created() > 0 {
            if let Err(e) = replayer.flush() {
                error!(error = %e, "Imported records are not saved yet");
                summary.write_pending = true;
            }
        }
        Ok(())
    })?;

    info!(
        notes = summary.imported_notes,
        folders = summary.imported_folders,
        skipped_notes = summary.skipped_notes,
        skipped_folders = summary.skipped_folders,
        "Import complete"
    );
    Ok(summary)
}
