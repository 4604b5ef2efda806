//! # Legacy Migration
//!
//! Older versions kept everything in a flat key-value store under two keys,
//! `folders` and `notes`, with looser record shapes: ids may be numbers, optional
//! fields may be missing, and attachments may use `imageUrl`/`fileType` instead of
//! `fileUrl`/`fileMimeType`.
//!
//! [`MigrationService::run`] copies those records into the adapter once:
//!
//! 1. Read both collections. If both are empty there is nothing to do.
//! 2. Replay folders, minting new ids and remembering legacy id -> new id.
//! 3. Replay notes, mapping their folder through that table. Unknown folders
//!    leave the note unfiled.
//! 4. Flush once, then delete both legacy collections in one write.
//!
//! Records that cannot be converted are logged and skipped. Steps 2 to 4 run in
//! one adapter batch. If the flush or the legacy delete fails, every replayed record
//! is removed again and the legacy data stays, so the next run starts from the same
//! place. The service remembers that it ran for the lifetime of the process; across
//! restarts it relies on the legacy collections being gone.

use crate::adapter::StorageAdapter;
use crate::error::{NotesError, Result};
use crate::model::{Attachment, EmbeddedImage, NewFolder, NewNote, NoteType};
use crate::replay::{record_key, Replayer};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub const FOLDERS_KEY: &str = "folders";
pub const NOTES_KEY: &str = "notes";

const DEFAULT_FOLDER_COLOR: &str = "#6b7280";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Read/delete access to the legacy key-value data.
pub trait LegacyStore {
    fn read(&self, key: &str) -> Result<Option<Value>>;
    fn delete(&mut self, key: &str) -> Result<()>;

    /// Remove several keys. Stores that can should do it in a single write.
    fn delete_many(&mut self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }
}

/// Legacy data kept as one JSON object on disk, keyed by collection name.
#[derive(Debug, Clone)]
pub struct JsonKvStore {
    path: PathBuf,
}

impl JsonKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(NotesError::DeserializationFailed(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(NotesError::DeserializationFailed(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl LegacyStore for JsonKvStore {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.delete_many(&[key])
    }

    fn delete_many(&mut self, keys: &[&str]) -> Result<()> {
        let mut map = self.load()?;
        let removed = keys.iter().filter(|key| map.remove(**key).is_some()).count();
        if removed == 0 {
            return Ok(());
        }
        let content = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-memory legacy data, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, Value>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl LegacyStore for MemoryKv {
    fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// False when the service had already run in this process.
    pub ran: bool,
    pub folders_migrated: usize,
    pub notes_migrated: usize,
    pub skipped: usize,
    pub legacy_cleared: bool,
}

/// One-shot importer from the legacy key-value layout.
#[derive(Debug, Default)]
pub struct MigrationService {
    ran: Mutex<bool>,
}

impl MigrationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_run(&self) -> bool {
        *self.ran.lock()
    }

    pub fn run(
        &self,
        adapter: &StorageAdapter,
        legacy: &mut dyn LegacyStore,
    ) -> Result<MigrationReport> {
        // Held for the whole run so concurrent callers wait, then see it done.
        let mut ran = self.ran.lock();
        if *ran {
            debug!("Migration already ran in this process");
            return Ok(MigrationReport::default());
        }
        adapter.ensure_initialized()?;

        let folders = read_collection(legacy, FOLDERS_KEY)?;
        let notes = read_collection(legacy, NOTES_KEY)?;

        let mut report = MigrationReport {
            ran: true,
            ..MigrationReport::default()
        };

        if folders.is_empty() && notes.is_empty() {
            *ran = true;
            debug!("No legacy data to migrate");
            return Ok(report);
        }

        info!(
            folders = folders.len(),
            notes = notes.len(),
            "Migrating legacy data"
        );

        adapter.batch(|store| {
            let mut replayer = Replayer::new(store);

            for (index, value) in folders.iter().enumerate() {
                let replayed = parse_folder(value)
                    .and_then(|(legacy_id, folder)| replayer.folder(legacy_id.as_deref(), folder));
                match replayed {
                    Ok(_) => report.folders_migrated += 1,
                    Err(e) => {
                        warn!(index, error = %e, "Skipping legacy folder");
                        report.skipped += 1;
                    }
                }
            }

            for (index, value) in notes.iter().enumerate() {
                let replayed = parse_note(value)
                    .and_then(|(legacy_folder, note)| replayer.note(legacy_folder.as_deref(), note));
                match replayed {
                    Ok(_) => report.notes_migrated += 1,
                    Err(e) => {
                        warn!(index, error = %e, "Skipping legacy note");
                        report.skipped += 1;
                    }
                }
            }

            if let Err(e) = replayer.flush() {
                error!(error = %e, "Migrated records could not be saved, keeping legacy data");
                replayer.rollback();
                report.skipped += report.folders_migrated + report.notes_migrated;
                report.folders_migrated = 0;
                report.notes_migrated = 0;
                return Ok(());
            }

            if let Err(e) = legacy.delete_many(&[FOLDERS_KEY, NOTES_KEY]) {
                error!(error = %e, "Could not clear legacy data, undoing migration");
                replayer.rollback();
                if let Err(undo) = replayer.flush() {
                    error!(error = %undo, "Undo could not be saved");
                }
                return Err(e);
            }
            report.legacy_cleared = true;
            Ok(())
        })?;

        *ran = true;
        info!(
            folders = report.folders_migrated,
            notes = report.notes_migrated,
            skipped = report.skipped,
            cleared = report.legacy_cleared,
            "Migration complete"
        );
        Ok(report)
    }
}

/// True if either legacy collection holds records.
pub fn legacy_present(legacy: &dyn LegacyStore) -> Result<bool> {
    Ok(!read_collection(legacy, FOLDERS_KEY)?.is_empty()
        || !read_collection(legacy, NOTES_KEY)?.is_empty())
}

fn read_collection(legacy: &dyn LegacyStore, key: &str) -> Result<Vec<Value>> {
    match legacy.read(key)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => {
            warn!(key, "Legacy collection is not a list, ignoring it");
            Ok(Vec::new())
        }
    }
}

fn field<'a>(record: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| record.get(*name))
        .find(|value| !value.is_null())
}

fn text_field(record: &Map<String, Value>, names: &[&str]) -> Option<String> {
    field(record, names)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn as_record(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| NotesError::ValidationFailed("record is not an object".to_string()))
}

fn parse_folder(value: &Value) -> Result<(Option<String>, NewFolder)> {
    let record = as_record(value)?;
    let name = text_field(record, &["name"])
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| NotesError::ValidationFailed("folder has no name".to_string()))?;
    let color = text_field(record, &["color"]).unwrap_or_else(|| DEFAULT_FOLDER_COLOR.to_string());
    let legacy_id = field(record, &["id"]).and_then(record_key);
    Ok((legacy_id, NewFolder::new(name, color)))
}

fn parse_attachment(record: &Map<String, Value>) -> Option<Attachment> {
    let file_url = text_field(record, &["fileUrl", "imageUrl"])?;
    Some(Attachment {
        file_url,
        file_name: text_field(record, &["fileName"]).unwrap_or_else(|| "attachment".to_string()),
        file_size: field(record, &["fileSize"])
            .and_then(Value::as_u64)
            .unwrap_or(0),
        file_mime_type: text_field(record, &["fileMimeType", "fileType"])
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
    })
}

fn parse_note(value: &Value) -> Result<(Option<String>, NewNote)> {
    let record = as_record(value)?;
    let title = text_field(record, &["title"])
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| NotesError::ValidationFailed("note has no title".to_string()))?;
    let attachment = parse_attachment(record);

    let note_type = match text_field(record, &["type"]) {
        Some(kind) => kind.parse::<NoteType>()?,
        None => match &attachment {
            Some(a) if a.file_mime_type.starts_with("image/") => NoteType::Image,
            Some(_) => NoteType::File,
            None => NoteType::Text,
        },
    };

    let tags = field(record, &["tags"])
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let embedded_images = match field(record, &["embeddedImages"]) {
        Some(images) => serde_json::from_value::<Vec<EmbeddedImage>>(images.clone())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Dropping unreadable embedded images");
                Vec::new()
            }),
        None => Vec::new(),
    };

    let note = NewNote {
        title,
        content: text_field(record, &["content"]).unwrap_or_default(),
        note_type,
        tags,
        folder_id: None,
        is_favorite: field(record, &["isFavorite"])
            .and_then(Value::as_bool)
            .unwrap_or(false),
        attachment,
        embedded_images,
    };
    let legacy_folder = field(record, &["folderId"]).and_then(record_key);
    Ok((legacy_folder, note))
}
