use super::tables::Tables;
use super::DataStore;
use crate::error::Result;
use crate::model::{Folder, FolderUpdate, NewFolder, NewNote, Note, NoteUpdate};
use chrono::Utc;
use uuid::Uuid;

/// Volatile backend: everything lives in process memory and is gone on exit.
///
/// Construction cannot fail, which is what makes this the entry state of every
/// session and the fallback when durable storage is unavailable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Every record, folders first, for replay into another backend.
    pub fn snapshot(&self) -> (Vec<Folder>, Vec<Note>) {
        (self.tables.folders(), self.tables.notes())
    }
}

impl DataStore for MemoryStore {
    fn create_note(&mut self, note: NewNote) -> Result<Note> {
        self.tables.create_note(note, Utc::now())
    }

    fn update_note(&mut self, id: &Uuid, update: NoteUpdate) -> Result<Note> {
        self.tables.update_note(id, update, Utc::now())
    }

    fn delete_note(&mut self, id: &Uuid) -> Result<()> {
        self.tables.delete_note(id)
    }

    fn get_note(&self, id: &Uuid) -> Result<Note> {
        self.tables.note(id)
    }

    fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(self.tables.notes())
    }

    fn create_folder(&mut self, folder: NewFolder) -> Result<Folder> {
        self.tables.create_folder(folder, Utc::now())
    }

    fn update_folder(&mut self, id: &Uuid, update: FolderUpdate) -> Result<Folder> {
        self.tables.update_folder(id, update)
    }

    fn delete_folder(&mut self, id: &Uuid) -> Result<()> {
        self.tables.delete_folder(id).map(|_| ())
    }

    fn get_folder(&self, id: &Uuid) -> Result<Folder> {
        self.tables.folder(id)
    }

    fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.tables.folders())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotesError;

    #[test]
    fn test_round_trip_create_and_list() {
        let mut store = MemoryStore::new();
        let created = store
            .create_note(NewNote::text("Title", "Body").tagged(["x"]).favorite())
            .unwrap();

        let notes = store.list_notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0], created);
        assert_eq!(notes[0].title, "Title");
        assert_eq!(notes[0].content, "Body");
        assert_eq!(notes[0].tags, vec!["x"]);
        assert!(notes[0].is_favorite);
    }

    #[test]
    fn test_folder_delete_scenario() {
        let mut store = MemoryStore::new();
        let f1 = store.create_folder(NewFolder::new("Work", "#3b82f6")).unwrap();
        let n1 = store.create_note(NewNote::text("A", "").in_folder(f1.id)).unwrap();

        store.delete_folder(&f1.id).unwrap();

        let notes = store.list_notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, n1.id);
        assert_eq!(notes[0].title, "A");
        assert!(notes[0].folder_id.is_none());
    }

    #[test]
    fn test_by_folder_and_favorites() {
        let mut store = MemoryStore::new();
        let folder = store.create_folder(NewFolder::new("Work", "#000")).unwrap();
        store.create_note(NewNote::text("In", "").in_folder(folder.id)).unwrap();
        store.create_note(NewNote::text("Out", "").favorite()).unwrap();

        let inside = store.notes_by_folder(Some(&folder.id)).unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].title, "In");

        let unfiled = store.notes_by_folder(None).unwrap();
        assert_eq!(unfiled.len(), 1);
        assert_eq!(unfiled[0].title, "Out");

        let favorites = store.favorites().unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].title, "Out");
    }

    #[test]
    fn test_search_delegates_to_query() {
        let mut store = MemoryStore::new();
        store.create_note(NewNote::text("Shopping", "Eggs")).unwrap();
        store.create_note(NewNote::text("Work", "")).unwrap();
        assert_eq!(store.search("eggs").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_unknown_note_fails() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.delete_note(&Uuid::new_v4()),
            Err(NotesError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_snapshot_lists_everything() {
        let mut store = MemoryStore::new();
        store.create_folder(NewFolder::new("Work", "#000")).unwrap();
        store.create_note(NewNote::text("A", "")).unwrap();
        let (folders, notes) = store.snapshot();
        assert_eq!(folders.len(), 1);
        assert_eq!(notes.len(), 1);
        assert!(!store.is_empty());
    }
}
