use super::access::FileSelection;
use super::autosave::AutosaveTask;
use super::image;
use super::tables::{ReplayReport, Tables};
use super::{DataStore, WritePolicy};
use crate::error::{NotesError, Result};
use crate::model::{Folder, FolderUpdate, NewFolder, NewNote, Note, NoteUpdate};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// State shared with the autosave thread.
#[derive(Debug)]
struct Shared {
    path: PathBuf,
    tables: Mutex<Tables>,
    dirty: AtomicBool,
    /// Serializes flushes so two writers never race on the temp file.
    io: Mutex<()>,
}

impl Shared {
    fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.lock();
        let value = f(&mut tables)?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&*self.tables.lock())
    }

    fn flush(&self) -> Result<()> {
        let _io = self.io.lock();
        let bytes = {
            let tables = self.tables.lock();
            let bytes = image::encode(&tables)?;
            // Cleared under the tables lock: any later mutation sets it again.
            self.dirty.store(false, Ordering::SeqCst);
            bytes
        };
        if let Err(e) = write_atomic(&self.path, &bytes) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        debug!(path = %self.path.display(), bytes = bytes.len(), "Flushed durable image");
        Ok(())
    }

    fn flush_if_dirty(&self) -> Result<()> {
        if self.dirty.load(Ordering::SeqCst) {
            self.flush()
        } else {
            Ok(())
        }
    }
}

/// Durable backend: in-memory tables mirrored to one image file.
///
/// Under `WriteThrough` every successful mutation is on disk before it returns. If
/// the write fails the mutation still stands in memory, the store stays dirty, and
/// the caller gets `WriteFailed`; the next successful flush catches the file up.
#[derive(Debug)]
pub struct FileStore {
    shared: Arc<Shared>,
    policy: WritePolicy,
    autosave: Option<AutosaveTask>,
    closed: bool,
    deferred: bool,
}

impl FileStore {
    fn with_tables(path: PathBuf, tables: Tables, policy: WritePolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                path,
                tables: Mutex::new(tables),
                dirty: AtomicBool::new(false),
                io: Mutex::new(()),
            }),
            policy,
            autosave: None,
            closed: false,
            deferred: false,
        }
    }

    /// Load an existing image. Unreadable or malformed files are `DeserializationFailed`.
    pub fn open(path: impl Into<PathBuf>, policy: WritePolicy) -> Result<Self> {
        let path = path.into();
        let bytes = fs::read(&path).map_err(|e| {
            NotesError::DeserializationFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let tables = image::decode(&bytes)?;
        info!(path = %path.display(), "Opened durable store");
        Ok(Self::with_tables(path, tables, policy))
    }

    /// Start an empty image at `path`, writing it immediately.
    pub fn create(path: impl Into<PathBuf>, policy: WritePolicy) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    NotesError::WriteFailed(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let store = Self::with_tables(path, Tables::new(), policy);
        store.shared.flush()?;
        info!(path = %store.path().display(), "Created durable store");
        Ok(store)
    }

    pub fn from_selection(selection: FileSelection, policy: WritePolicy) -> Result<Self> {
        match selection {
            FileSelection::Open(path) => Self::open(path, policy),
            FileSelection::Create(path) => Self::create(path, policy),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.shared.read(Tables::is_empty)
    }

    /// Copy complete records in and write the result once, regardless of policy.
    pub fn import_records(
        &mut self,
        folders: Vec<Folder>,
        notes: Vec<Note>,
    ) -> Result<ReplayReport> {
        let report = self.shared.mutate(|tables| tables.replay(folders, notes))?;
        self.shared.flush()?;
        Ok(report)
    }

    /// Begin periodic flushing. No-op under `WriteThrough` or if already running.
    pub fn start_autosave(&mut self) -> Result<()> {
        let interval = match self.policy {
            WritePolicy::Periodic(interval) => interval,
            WritePolicy::WriteThrough => return Ok(()),
        };
        if self.autosave.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let task = AutosaveTask::spawn(interval, move || {
            if let Err(e) = shared.flush_if_dirty() {
                error!(error = %e, "Autosave failed");
            }
        })?;
        self.autosave = Some(task);
        Ok(())
    }

    /// Drop the store without a final flush.
    pub fn discard(mut self) {
        self.stop_autosave();
        self.closed = true;
        debug!(path = %self.path().display(), "Discarded durable store");
    }

    fn stop_autosave(&mut self) {
        if let Some(mut task) = self.autosave.take() {
            task.stop();
        }
    }

    fn after_write(&mut self) -> Result<()> {
        // Writes after close() re-arm the final flush on drop.
        self.closed = false;
        if self.deferred {
            return Ok(());
        }
        match self.policy {
            WritePolicy::WriteThrough => self.shared.flush(),
            WritePolicy::Periodic(_) => Ok(()),
        }
    }
}

impl DataStore for FileStore {
    fn create_note(&mut self, note: NewNote) -> Result<Note> {
        let note = self
            .shared
            .mutate(|tables| tables.create_note(note, Utc::now()))?;
        self.after_write()?;
        Ok(note)
    }

    fn update_note(&mut self, id: &Uuid, update: NoteUpdate) -> Result<Note> {
        let note = self
            .shared
            .mutate(|tables| tables.update_note(id, update, Utc::now()))?;
        self.after_write()?;
        Ok(note)
    }

    fn delete_note(&mut self, id: &Uuid) -> Result<()> {
        self.shared.mutate(|tables| tables.delete_note(id))?;
        self.after_write()
    }

    fn get_note(&self, id: &Uuid) -> Result<Note> {
        self.shared.read(|tables| tables.note(id))
    }

    fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(self.shared.read(Tables::notes))
    }

    fn create_folder(&mut self, folder: NewFolder) -> Result<Folder> {
        let folder = self
            .shared
            .mutate(|tables| tables.create_folder(folder, Utc::now()))?;
        self.after_write()?;
        Ok(folder)
    }

    fn update_folder(&mut self, id: &Uuid, update: FolderUpdate) -> Result<Folder> {
        let folder = self
            .shared
            .mutate(|tables| tables.update_folder(id, update))?;
        self.after_write()?;
        Ok(folder)
    }

    fn delete_folder(&mut self, id: &Uuid) -> Result<()> {
        let unfiled = self.shared.mutate(|tables| tables.delete_folder(id))?;
        debug!(folder = %id, unfiled, "Deleted folder");
        self.after_write()
    }

    fn get_folder(&self, id: &Uuid) -> Result<Folder> {
        self.shared.read(|tables| tables.folder(id))
    }

    fn list_folders(&self) -> Result<Vec<Folder>> {
        Ok(self.shared.read(Tables::folders))
    }

    fn flush(&self) -> Result<()> {
        self.shared.flush()
    }

    fn defer_writes(&mut self, deferred: bool) {
        self.deferred = deferred;
    }

    fn close(&mut self) -> Result<()> {
        self.stop_autosave();
        if self.closed {
            return Ok(());
        }
        self.shared.flush_if_dirty()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.stop_autosave();
        if let Err(e) = self.shared.flush_if_dirty() {
            error!(error = %e, path = %self.shared.path.display(), "Final flush failed");
        }
    }
}

/// Path of the temp file a flush writes before renaming over `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notepocket".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write `bytes` to a sibling temp file, sync it, and rename it over `path`.
///
/// On failure the previous contents of `path` are untouched.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    result.map_err(|e| {
        if tmp.is_file() {
            let _ = fs::remove_file(&tmp);
        }
        NotesError::WriteFailed(format!("{}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        (dir, path)
    }

    fn reopen(path: &Path) -> FileStore {
        FileStore::open(path, WritePolicy::WriteThrough).unwrap()
    }

    #[test]
    fn test_create_writes_empty_image() {
        let (_dir, path) = setup();
        let store = FileStore::create(&path, WritePolicy::WriteThrough).unwrap();
        assert!(path.exists());
        assert!(store.is_empty());
        drop(store);
        assert!(reopen(&path).is_empty());
    }

    #[test]
    fn test_create_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("notes.json");
        FileStore::create(&path, WritePolicy::WriteThrough).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_through_persists_each_mutation() {
        let (_dir, path) = setup();
        let mut store = FileStore::create(&path, WritePolicy::WriteThrough).unwrap();
        let folder = store.create_folder(NewFolder::new("Work", "#3b82f6")).unwrap();
        let note = store
            .create_note(NewNote::text("A", "body").in_folder(folder.id))
            .unwrap();
        assert!(!store.is_dirty());

        // A second handle sees the data without the first being closed.
        let other = reopen(&path);
        assert_eq!(other.get_note(&note.id).unwrap(), note);
        assert_eq!(other.get_folder(&folder.id).unwrap(), folder);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let (_dir, path) = setup();
        let result = FileStore::open(&path, WritePolicy::WriteThrough);
        assert!(matches!(result, Err(NotesError::DeserializationFailed(_))));
    }

    #[test]
    fn test_open_empty_file_fails() {
        let (_dir, path) = setup();
        fs::write(&path, "").unwrap();
        let result = FileStore::open(&path, WritePolicy::WriteThrough);
        assert!(matches!(result, Err(NotesError::DeserializationFailed(_))));
    }

    #[test]
    fn test_failed_write_keeps_previous_image() {
        let (_dir, path) = setup();
        let mut store = FileStore::create(&path, WritePolicy::WriteThrough).unwrap();
        store.create_note(NewNote::text("First", "")).unwrap();

        // A directory squatting on the temp path makes the next write fail.
        let tmp = temp_path(&path);
        fs::create_dir(&tmp).unwrap();

        let result = store.create_note(NewNote::text("Second", ""));
        assert!(matches!(result, Err(NotesError::WriteFailed(_))));
        assert!(store.is_dirty());
        assert_eq!(store.list_notes().unwrap().len(), 2);
        assert_eq!(reopen(&path).list_notes().unwrap().len(), 1);

        fs::remove_dir(&tmp).unwrap();
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(reopen(&path).list_notes().unwrap().len(), 2);
    }

    #[test]
    fn test_deferred_writes_wait_for_explicit_flush() {
        let (_dir, path) = setup();
        let mut store = FileStore::create(&path, WritePolicy::WriteThrough).unwrap();
        let tmp = temp_path(&path);
        fs::create_dir(&tmp).unwrap();

        store.defer_writes(true);
        store.create_note(NewNote::text("A", "")).unwrap();
        store.create_note(NewNote::text("B", "")).unwrap();
        assert!(store.is_dirty());
        assert!(matches!(store.flush(), Err(NotesError::WriteFailed(_))));

        fs::remove_dir(&tmp).unwrap();
        store.flush().unwrap();
        store.defer_writes(false);
        assert_eq!(reopen(&path).list_notes().unwrap().len(), 2);

        store.create_note(NewNote::text("C", "")).unwrap();
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_periodic_defers_until_close() {
        let (_dir, path) = setup();
        let policy = WritePolicy::Periodic(Duration::from_secs(3600));
        let mut store = FileStore::create(&path, policy).unwrap();
        store.start_autosave().unwrap();
        store.create_note(NewNote::text("A", "")).unwrap();

        assert!(store.is_dirty());
        assert!(reopen(&path).is_empty());

        store.close().unwrap();
        assert_eq!(reopen(&path).list_notes().unwrap().len(), 1);
    }

    #[test]
    fn test_periodic_autosave_flushes_in_background() {
        let (_dir, path) = setup();
        let policy = WritePolicy::Periodic(Duration::from_millis(20));
        let mut store = FileStore::create(&path, policy).unwrap();
        store.start_autosave().unwrap();
        store.create_note(NewNote::text("A", "")).unwrap();

        let mut flushed = false;
        for _ in 0..100 {
            std::thread::sleep(Duration::from_millis(20));
            if !store.is_dirty() {
                flushed = true;
                break;
            }
        }
        assert!(flushed);
        assert_eq!(reopen(&path).list_notes().unwrap().len(), 1);
        store.close().unwrap();
    }

    #[test]
    fn test_drop_flushes_pending_changes() {
        let (_dir, path) = setup();
        let policy = WritePolicy::Periodic(Duration::from_secs(3600));
        {
            let mut store = FileStore::create(&path, policy).unwrap();
            store.create_note(NewNote::text("A", "")).unwrap();
        }
        assert_eq!(reopen(&path).list_notes().unwrap().len(), 1);
    }

    #[test]
    fn test_discard_skips_final_flush() {
        let (_dir, path) = setup();
        let policy = WritePolicy::Periodic(Duration::from_secs(3600));
        let mut store = FileStore::create(&path, policy).unwrap();
        store.create_note(NewNote::text("A", "")).unwrap();
        store.discard();
        assert!(reopen(&path).is_empty());
    }

    #[test]
    fn test_import_records_flushes_once() {
        let (_dir, path) = setup();
        let mut source = Tables::new();
        let folder = source
            .create_folder(NewFolder::new("Work", "#000"), Utc::now())
            .unwrap();
        let note = source
            .create_note(NewNote::text("A", "").in_folder(folder.id), Utc::now())
            .unwrap();

        let policy = WritePolicy::Periodic(Duration::from_secs(3600));
        let mut store = FileStore::create(&path, policy).unwrap();
        let report = store
            .import_records(source.folders(), source.notes())
            .unwrap();
        assert_eq!(report.notes, 1);
        assert!(!store.is_dirty());

        let reopened = reopen(&path);
        assert_eq!(reopened.get_note(&note.id).unwrap(), note);
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let path = Path::new("/data/notes.json");
        assert_eq!(temp_path(path), Path::new("/data/.notes.json.tmp"));
    }
}
