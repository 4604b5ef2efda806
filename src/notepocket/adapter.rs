//! # Storage Adapter
//!
//! [`StorageAdapter`] is the only thing the rest of the application talks to. It owns
//! exactly one backend at a time and answers every CRUD and query call by
//! delegating to it.
//!
//! ## States
//!
//! ```text
//! Uninitialized --initialize()--> VolatileActive --upgrade()--> Migrating --ok--> DurableActive
//!                                       ^                           |
//!                                       +---------- error ----------+
//! ```
//!
//! `DurableActive` is terminal for the session. A failed upgrade leaves the volatile
//! store exactly as it was: the durable store is built off to the side and only
//! swapped in once every record has been copied and written.
//!
//! ## Locking
//!
//! - `active` (RwLock) guards the backend. Reads share it, mutations take it
//!   exclusively, so a folder delete and its unfiling are never seen half done.
//! - `upgrade_lock` serializes `upgrade()` calls.
//! - `state` is only ever taken after `active`, never before.
//!
//! File selection and opening the durable file happen without the backend lock, so
//! queries keep running while the user picks a file.

use crate::bulk::{self, ExportData, ImportPayload, ImportSummary};
use crate::config::NotesConfig;
use crate::demo;
use crate::error::{NotesError, Result};
use crate::model::{Folder, FolderUpdate, NewFolder, NewNote, Note, NoteUpdate};
use crate::query::{self, NoteFilter, SortOrder};
use crate::store::access::FileAccess;
use crate::store::file::FileStore;
use crate::store::memory::MemoryStore;
use crate::store::DataStore;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    VolatileActive,
    Migrating,
    DurableActive,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AdapterState::Uninitialized => "uninitialized",
            AdapterState::VolatileActive => "volatile",
            AdapterState::Migrating => "migrating",
            AdapterState::DurableActive => "durable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Volatile,
    Durable,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Volatile => f.write_str("volatile"),
            Backend::Durable => f.write_str("durable"),
        }
    }
}

/// Observability snapshot: which backend is live and whether `initialize()` ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub backend: Backend,
    pub initialized: bool,
    pub path: Option<PathBuf>,
}

/// Outcome of a successful `upgrade()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// The adapter was already durable; nothing was copied.
    pub already_durable: bool,
    pub path: PathBuf,
    pub folders: usize,
    pub notes: usize,
    /// Records whose id collided with one already in the file.
    pub remapped: usize,
}

/// The live backend. A closed set: volatile or durable, chosen once per switch.
#[derive(Debug)]
enum ActiveStore {
    Volatile(MemoryStore),
    Durable(FileStore),
}

impl ActiveStore {
    fn store(&self) -> &dyn DataStore {
        match self {
            ActiveStore::Volatile(store) => store,
            ActiveStore::Durable(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn DataStore {
        match self {
            ActiveStore::Volatile(store) => store,
            ActiveStore::Durable(store) => store,
        }
    }

    fn backend(&self) -> Backend {
        match self {
            ActiveStore::Volatile(_) => Backend::Volatile,
            ActiveStore::Durable(_) => Backend::Durable,
        }
    }

    fn path(&self) -> Option<PathBuf> {
        match self {
            ActiveStore::Volatile(_) => None,
            ActiveStore::Durable(store) => Some(store.path().to_path_buf()),
        }
    }
}

pub struct StorageAdapter {
    config: NotesConfig,
    active: RwLock<Option<ActiveStore>>,
    state: Mutex<AdapterState>,
    upgrade_lock: Mutex<()>,
}

impl Default for StorageAdapter {
    fn default() -> Self {
        Self::new(NotesConfig::default())
    }
}

impl StorageAdapter {
    pub fn new(config: NotesConfig) -> Self {
        Self {
            config,
            active: RwLock::new(None),
            state: Mutex::new(AdapterState::Uninitialized),
            upgrade_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &NotesConfig {
        &self.config
    }

    /// Enter `VolatileActive`. Always succeeds; repeated calls are no-ops.
    pub fn initialize(&self) {
        let mut active = self.active.write();
        if active.is_some() {
            return;
        }

        let mut store = MemoryStore::new();
        if self.config.seed_demo_data {
            match demo::seed(&mut store) {
                Ok(true) => info!("Seeded demo data"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to seed demo data"),
            }
        }

        *active = Some(ActiveStore::Volatile(store));
        *self.state.lock() = AdapterState::VolatileActive;
        info!("Storage initialized (volatile)");
    }

    /// Move every record into a durable file and switch to it.
    ///
    /// Declined upgrades (`InitializationUnsupported`, `FileSelectionCancelled`,
    /// `DeserializationFailed`) and write failures leave the adapter on the volatile
    /// store with its data untouched.
    pub fn upgrade(&self, access: &dyn FileAccess) -> Result<UpgradeReport> {
        let _upgrading = self.upgrade_lock.lock();

        match self.state() {
            AdapterState::Uninitialized => return Err(NotesError::NotInitialized),
            AdapterState::DurableActive => {
                let path = self.active.read().as_ref().and_then(ActiveStore::path);
                return Ok(UpgradeReport {
                    already_durable: true,
                    path: path.unwrap_or_default(),
                    folders: 0,
                    notes: 0,
                    remapped: 0,
                });
            }
            AdapterState::VolatileActive | AdapterState::Migrating => {}
        }

        if !access.is_supported() {
            warn!("Durable storage unsupported, staying on volatile store");
            return Err(NotesError::InitializationUnsupported);
        }

        let selection = access.select().map_err(|e| {
            warn!(error = %e, "Upgrade declined during file selection");
            e
        })?;
        let policy = self.config.write_policy()?;
        info!(path = %selection.path().display(), ?policy, "Upgrading to durable storage");

        let mut durable = FileStore::from_selection(selection, policy).map_err(|e| {
            warn!(error = %e, "Could not open durable store");
            e
        })?;

        let mut active = self.active.write();
        *self.state.lock() = AdapterState::Migrating;

        let (folders, notes) = match active.as_ref() {
            Some(ActiveStore::Volatile(store)) => store.snapshot(),
            _ => {
                durable.discard();
                *self.state.lock() = AdapterState::VolatileActive;
                return Err(NotesError::NotInitialized);
            }
        };

        let copied = durable.import_records(folders, notes).and_then(|report| {
            durable.start_autosave()?;
            Ok(report)
        });

        match copied {
            Ok(report) => {
                let path = durable.path().to_path_buf();
                *active = Some(ActiveStore::Durable(durable));
                *self.state.lock() = AdapterState::DurableActive;
                info!(
                    path = %path.display(),
                    folders = report.folders,
                    notes = report.notes,
                    remapped = report.remapped,
                    "Upgrade complete"
                );
                Ok(UpgradeReport {
                    already_durable: false,
                    path,
                    folders: report.folders,
                    notes: report.notes,
                    remapped: report.remapped,
                })
            }
            Err(e) => {
                durable.discard();
                *self.state.lock() = AdapterState::VolatileActive;
                warn!(error = %e, "Upgrade failed, staying on volatile store");
                Err(e)
            }
        }
    }

    pub fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    pub fn status(&self) -> Status {
        let active = self.active.read();
        match active.as_ref() {
            Some(store) => Status {
                backend: store.backend(),
                initialized: true,
                path: store.path(),
            },
            None => Status {
                backend: Backend::Volatile,
                initialized: false,
                path: None,
            },
        }
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.active.read().is_some() {
            Ok(())
        } else {
            Err(NotesError::NotInitialized)
        }
    }

    /// Folders and notes read under one lock, so they agree with each other.
    pub(crate) fn snapshot(&self) -> Result<(Vec<Folder>, Vec<Note>)> {
        self.with_store(|store| Ok((store.list_folders()?, store.list_notes()?)))
    }

    fn with_store<T>(&self, f: impl FnOnce(&dyn DataStore) -> Result<T>) -> Result<T> {
        let active = self.active.read();
        let store = active.as_ref().ok_or(NotesError::NotInitialized)?;
        f(store.store())
    }

    fn with_store_mut<T>(&self, f: impl FnOnce(&mut dyn DataStore) -> Result<T>) -> Result<T> {
        let mut active = self.active.write();
        let store = active.as_mut().ok_or(NotesError::NotInitialized)?;
        f(store.store_mut())
    }

    /// Run `f` under one exclusive lock with per-write flushes held back.
    ///
    /// Every mutation inside lands in memory and nowhere else; `f` owns the single
    /// flush, and any undo if that flush fails.
    pub(crate) fn batch<T>(&self, f: impl FnOnce(&mut dyn DataStore) -> Result<T>) -> Result<T> {
        self.with_store_mut(|store| {
            store.defer_writes(true);
            let result = f(&mut *store);
            store.defer_writes(false);
            result
        })
    }

    // --- Notes ---

    pub fn create_note(&self, note: NewNote) -> Result<Note> {
        self.with_store_mut(|store| store.create_note(note))
    }

    pub fn update_note(&self, id: &Uuid, update: NoteUpdate) -> Result<Note> {
        self.with_store_mut(|store| store.update_note(id, update))
    }

    pub fn delete_note(&self, id: &Uuid) -> Result<()> {
        self.with_store_mut(|store| store.delete_note(id))
    }

    pub fn get_note(&self, id: &Uuid) -> Result<Note> {
        self.with_store(|store| store.get_note(id))
    }

    pub fn get_all_notes(&self) -> Result<Vec<Note>> {
        self.with_store(|store| store.list_notes())
    }

    // --- Folders ---

    pub fn create_folder(&self, folder: NewFolder) -> Result<Folder> {
        self.with_store_mut(|store| store.create_folder(folder))
    }

    pub fn update_folder(&self, id: &Uuid, update: FolderUpdate) -> Result<Folder> {
        self.with_store_mut(|store| store.update_folder(id, update))
    }

    pub fn delete_folder(&self, id: &Uuid) -> Result<()> {
        self.with_store_mut(|store| store.delete_folder(id))
    }

    pub fn get_folder(&self, id: &Uuid) -> Result<Folder> {
        self.with_store(|store| store.get_folder(id))
    }

    pub fn get_all_folders(&self) -> Result<Vec<Folder>> {
        self.with_store(|store| store.list_folders())
    }

    // --- Queries ---

    pub fn search(&self, text: &str) -> Result<Vec<Note>> {
        self.with_store(|store| store.search(text))
    }

    pub fn notes_by_folder(&self, folder: Option<Uuid>) -> Result<Vec<Note>> {
        self.with_store(|store| store.notes_by_folder(folder.as_ref()))
    }

    pub fn favorite_notes(&self) -> Result<Vec<Note>> {
        self.with_store(|store| store.favorites())
    }

    pub fn query_notes(&self, filter: &NoteFilter, order: SortOrder) -> Result<Vec<Note>> {
        self.with_store(|store| Ok(query::apply(store.list_notes()?, filter, order)))
    }

    // --- Bulk ---

    pub fn import_data(&self, payload: &ImportPayload) -> Result<ImportSummary> {
        bulk::import(self, payload)
    }

    pub fn export_data(&self) -> Result<ExportData> {
        bulk::export(self)
    }

    // --- Persistence ---

    /// Flush the durable image now, surfacing any write error.
    pub fn force_save(&self) -> Result<()> {
        self.with_store(|store| store.flush())
    }

    /// Stop autosave and write pending changes. The adapter stays usable.
    pub fn close(&self) -> Result<()> {
        let mut active = self.active.write();
        match active.as_mut() {
            Some(store) => store.store_mut().close(),
            None => Ok(()),
        }
    }
}
