use crate::error::{NotesError, Result};
use crate::model::{
    validate_folder_name, validate_title, Folder, FolderUpdate, NewFolder, NewNote, Note,
    NoteUpdate,
};
use crate::query::{sort_notes, SortOrder};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// The in-memory record tables behind every backend.
///
/// All invariants live here: folder references must resolve at write time,
/// deleting a folder unfiles its notes in the same call, and ids are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    notes: HashMap<Uuid, Note>,
    folders: HashMap<Uuid, Folder>,
}

/// Outcome of replaying records from another store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub folders: usize,
    pub notes: usize,
    /// Records that kept their id but had to be given a fresh one.
    pub remapped: usize,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild tables from a decoded image.
    ///
    /// Duplicate ids and invalid records are errors. A note pointing at a folder
    /// that doesn't exist is unfiled instead.
    pub fn from_records(folders: Vec<Folder>, notes: Vec<Note>) -> Result<Self> {
        let mut tables = Self::new();

        for folder in folders {
            validate_folder_name(&folder.name)?;
            if tables.folders.contains_key(&folder.id) {
                return Err(NotesError::ValidationFailed(format!(
                    "duplicate folder id {}",
                    folder.id
                )));
            }
            tables.folders.insert(folder.id, folder);
        }

        for mut note in notes {
            validate_title(&note.title)?;
            if tables.notes.contains_key(&note.id) {
                return Err(NotesError::ValidationFailed(format!(
                    "duplicate note id {}",
                    note.id
                )));
            }
            if let Some(folder_id) = note.folder_id {
                if !tables.folders.contains_key(&folder_id) {
                    warn!(note = %note.id, folder = %folder_id, "Unfiling note with dangling folder reference");
                    note.folder_id = None;
                }
            }
            tables.notes.insert(note.id, note);
        }

        Ok(tables)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.folders.is_empty()
    }

    fn check_folder_ref(&self, folder_id: Option<Uuid>) -> Result<()> {
        match folder_id {
            Some(id) if !self.folders.contains_key(&id) => Err(NotesError::ValidationFailed(
                format!("folder {} does not exist", id),
            )),
            _ => Ok(()),
        }
    }

    // --- Notes ---

    pub fn create_note(&mut self, new: NewNote, now: DateTime<Utc>) -> Result<Note> {
        self.check_folder_ref(new.folder_id)?;
        let mut note = Note::from_new(new, now)?;
        while self.notes.contains_key(&note.id) {
            note.id = Uuid::new_v4();
        }
        self.notes.insert(note.id, note.clone());
        Ok(note)
    }

    pub fn update_note(
        &mut self,
        id: &Uuid,
        update: NoteUpdate,
        now: DateTime<Utc>,
    ) -> Result<Note> {
        if let Some(folder_id) = update.folder_id {
            self.check_folder_ref(folder_id)?;
        }
        let note = self
            .notes
            .get_mut(id)
            .ok_or_else(|| NotesError::note_not_found(*id))?;
        note.apply(update, now)?;
        Ok(note.clone())
    }

    pub fn delete_note(&mut self, id: &Uuid) -> Result<()> {
        self.notes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| NotesError::note_not_found(*id))
    }

    pub fn note(&self, id: &Uuid) -> Result<Note> {
        self.notes
            .get(id)
            .cloned()
            .ok_or_else(|| NotesError::note_not_found(*id))
    }

    pub fn notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.notes.values().cloned().collect();
        sort_notes(&mut notes, SortOrder::Updated);
        notes
    }

    // --- Folders ---

    pub fn create_folder(&mut self, new: NewFolder, now: DateTime<Utc>) -> Result<Folder> {
        let mut folder = Folder::from_new(new, now)?;
        while self.folders.contains_key(&folder.id) {
            folder.id = Uuid::new_v4();
        }
        self.folders.insert(folder.id, folder.clone());
        Ok(folder)
    }

    pub fn update_folder(&mut self, id: &Uuid, update: FolderUpdate) -> Result<Folder> {
        let folder = self
            .folders
            .get_mut(id)
            .ok_or_else(|| NotesError::folder_not_found(*id))?;
        folder.apply(update)?;
        Ok(folder.clone())
    }

    /// Remove the folder and unfile its notes. Returns how many notes were unfiled.
    pub fn delete_folder(&mut self, id: &Uuid) -> Result<usize> {
        if self.folders.remove(id).is_none() {
            return Err(NotesError::folder_not_found(*id));
        }
        let mut unfiled = 0;
        for note in self.notes.values_mut() {
            if note.folder_id == Some(*id) {
                note.folder_id = None;
                unfiled += 1;
            }
        }
        Ok(unfiled)
    }

    pub fn folder(&self, id: &Uuid) -> Result<Folder> {
        self.folders
            .get(id)
            .cloned()
            .ok_or_else(|| NotesError::folder_not_found(*id))
    }

    pub fn folders(&self) -> Vec<Folder> {
        let mut folders: Vec<Folder> = self.folders.values().cloned().collect();
        folders.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        folders
    }

    // --- Replay ---

    /// Copy complete records (ids and timestamps included) from another store.
    ///
    /// Folders go first so note references can be resolved. A record whose id is
    /// already taken gets a fresh one, and notes follow their folder's new id. The
    /// whole replay is validated before anything is inserted, so an error leaves
    /// the tables unchanged.
    pub fn replay(&mut self, folders: Vec<Folder>, notes: Vec<Note>) -> Result<ReplayReport> {
        for folder in &folders {
            validate_folder_name(&folder.name)?;
        }
        for note in &notes {
            validate_title(&note.title)?;
        }

        let mut report = ReplayReport::default();
        let mut folder_ids: HashMap<Uuid, Uuid> = HashMap::new();

        for mut folder in folders {
            let original = folder.id;
            if self.folders.contains_key(&folder.id) {
                folder.id = self.fresh_folder_id();
                report.remapped += 1;
            }
            folder_ids.insert(original, folder.id);
            self.folders.insert(folder.id, folder);
            report.folders += 1;
        }

        for mut note in notes {
            note.folder_id = note
                .folder_id
                .and_then(|id| folder_ids.get(&id).copied().or(Some(id)))
                .filter(|id| self.folders.contains_key(id));
            if self.notes.contains_key(&note.id) {
                note.id = self.fresh_note_id();
                report.remapped += 1;
            }
            self.notes.insert(note.id, note);
            report.notes += 1;
        }

        Ok(report)
    }

    fn fresh_folder_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.folders.contains_key(&id) {
                return id;
            }
        }
    }

    fn fresh_note_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.notes.contains_key(&id) {
                return id;
            }
        }
    }
}
