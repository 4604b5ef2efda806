use crate::error::Result;
use crate::model::{Folder, NewFolder, NewNote, Note};
use crate::store::DataStore;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Normalize a foreign record id. Older data used numbers, newer data strings.
pub(crate) fn record_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Writes foreign records into a store inside an adapter batch.
///
/// Every record gets a fresh id. Folders must be replayed before notes: each one
/// is remembered under its foreign id so notes can follow it, and a note whose
/// foreign folder was never replayed lands unfiled.
///
/// Nothing is persisted until [`Replayer::flush`]. If that fails the caller either
/// keeps the records (they are in memory and the store is dirty) or calls
/// [`Replayer::rollback`] to remove exactly what this replayer created.
pub(crate) struct Replayer<'a, S: DataStore + ?Sized> {
    store: &'a mut S,
    folder_ids: HashMap<String, Uuid>,
    created_folders: Vec<Uuid>,
    created_notes: Vec<Uuid>,
}

impl<'a, S: DataStore + ?Sized> Replayer<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            folder_ids: HashMap::new(),
            created_folders: Vec::new(),
            created_notes: Vec::new(),
        }
    }

    pub fn folder(&mut self, foreign_id: Option<&str>, folder: NewFolder) -> Result<Folder> {
        let created = self.store.create_folder(folder)?;
        self.created_folders.push(created.id);
        if let Some(foreign_id) = foreign_id {
            self.folder_ids.insert(foreign_id.to_string(), created.id);
        }
        Ok(created)
    }

    pub fn note(&mut self, foreign_folder: Option<&str>, mut note: NewNote) -> Result<Note> {
        note.folder_id = foreign_folder.and_then(|id| self.folder_ids.get(id).copied());
        let created = self.store.create_note(note)?;
        self.created_notes.push(created.id);
        Ok(created)
    }

    pub fn created(&self) -> usize {
        self.created_folders.len() + self.created_notes.len()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    /// Delete everything this replayer created, notes first.
    pub fn rollback(&mut self) {
        for id in self.created_notes.drain(..) {
            if let Err(e) = self.store.delete_note(&id) {
                warn!(note = %id, error = %e, "Rollback could not remove note");
            }
        }
        for id in self.created_folders.drain(..) {
            if let Err(e) = self.store.delete_folder(&id) {
                warn!(folder = %id, error = %e, "Rollback could not remove folder");
            }
        }
        self.folder_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_record_key_normalizes_ids() {
        assert_eq!(record_key(&json!(7)), Some("7".to_string()));
        assert_eq!(record_key(&json!(" a1 ")), Some("a1".to_string()));
        assert_eq!(record_key(&json!("")), None);
        assert_eq!(record_key(&json!(null)), None);
        assert_eq!(record_key(&json!({"id": 1})), None);
    }

    #[test]
    fn test_notes_follow_replayed_folders() {
        let mut store = MemoryStore::new();
        let mut replayer = Replayer::new(&mut store);

        let folder = replayer
            .folder(Some("7"), NewFolder::new("Work", "#000"))
            .unwrap();
        let filed = replayer.note(Some("7"), NewNote::text("A", "")).unwrap();
        let orphan = replayer.note(Some("8"), NewNote::text("B", "")).unwrap();

        assert_eq!(filed.folder_id, Some(folder.id));
        assert!(orphan.folder_id.is_none());
        assert_eq!(replayer.created(), 3);
    }

    #[test]
    fn test_rollback_removes_only_replayed_records() {
        let mut store = MemoryStore::new();
        let existing = store.create_note(NewNote::text("Mine", "")).unwrap();

        let mut replayer = Replayer::new(&mut store);
        replayer
            .folder(Some("1"), NewFolder::new("Work", "#000"))
            .unwrap();
        replayer.note(Some("1"), NewNote::text("A", "")).unwrap();
        replayer.rollback();
        assert_eq!(replayer.created(), 0);

        assert_eq!(store.list_notes().unwrap(), vec![existing]);
        assert!(store.list_folders().unwrap().is_empty());
    }
}
