//! # Storage Layer
//!
//! This module defines the storage abstraction for notepocket. The [`DataStore`] trait
//! is the CRUD contract every backend satisfies; the [`StorageAdapter`](crate::adapter::StorageAdapter)
//! owns exactly one of them at a time.
//!
//! ## Backends
//!
//! - [`memory::MemoryStore`] (*volatile*): process memory only. Always available,
//!   never fails to initialize. This is where every session starts.
//! - [`file::FileStore`] (*durable*): the same in-memory tables, persisted as a single
//!   serialized image ([`image`]) in one user-designated file. Opening can fail
//!   (missing capability, cancelled selection, unreadable file).
//!
//! Both delegate the actual record bookkeeping to [`tables::Tables`], so the
//! invariants (folder references, `updated_at` monotonicity, cascade on folder
//! delete) are enforced in exactly one place.
//!
//! ## Write Policies
//!
//! [`WritePolicy`] controls when the durable image is rewritten:
//!
//! - `WriteThrough`: after every mutation, before the call returns. Loss window: none.
//! - `Periodic(d)`: mutations mark the image dirty and the [`autosave`] task flushes it
//!   every `d`. [`DataStore::close`] cancels the task and flushes one last time.
//!   Loss window: at most `d`.
//!
//! Every flush writes a sibling temp file, syncs it, then renames it over the
//! image, so a failed write leaves the previous image intact.
//!
//! ## Storage Layout
//!
//! ```text
//! <chosen dir>/
//! ├── notes.json          # Durable image (folders + notes)
//! └── .notes.json.tmp     # Only present while a flush is in flight
//! ```

use crate::error::Result;
use crate::model::{Folder, FolderUpdate, NewFolder, NewNote, Note, NoteUpdate};
use crate::query::{self, FolderScope, NoteFilter, SortOrder};
use std::time::Duration;
use uuid::Uuid;

pub mod access;
pub mod autosave;
pub mod file;
pub mod image;
pub mod memory;
pub mod tables;

/// When the durable image gets rewritten. See the module docs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePolicy {
    #[default]
    WriteThrough,
    Periodic(Duration),
}

/// Abstract interface for note storage.
///
/// Listing order is fixed: notes most recently updated first, folders by name.
pub trait DataStore {
    fn create_note(&mut self, note: NewNote) -> Result<Note>;

    /// Merge `update` into the note. Fails with `RecordNotFound` for unknown ids.
    fn update_note(&mut self, id: &Uuid, update: NoteUpdate) -> Result<Note>;

    fn delete_note(&mut self, id: &Uuid) -> Result<()>;

    fn get_note(&self, id: &Uuid) -> Result<Note>;

    fn list_notes(&self) -> Result<Vec<Note>>;

    fn create_folder(&mut self, folder: NewFolder) -> Result<Folder>;

    fn update_folder(&mut self, id: &Uuid, update: FolderUpdate) -> Result<Folder>;

    /// Delete a folder and unfile every note that referenced it, as one step.
    fn delete_folder(&mut self, id: &Uuid) -> Result<()>;

    fn get_folder(&self, id: &Uuid) -> Result<Folder>;

    fn list_folders(&self) -> Result<Vec<Folder>>;

    /// Persist pending changes now. No-op for stores without a durable image.
    fn flush(&self) -> Result<()>;

    /// While deferred, mutations skip their policy flush and only mark the store
    /// dirty. The caller flushes once when the batch is done.
    fn defer_writes(&mut self, _deferred: bool) {}

    /// Stop background work and persist pending changes.
    fn close(&mut self) -> Result<()>;

    fn search(&self, text: &str) -> Result<Vec<Note>> {
        Ok(query::search(self.list_notes()?, text))
    }

    /// Notes in `folder`, or unfiled notes when `folder` is `None`.
    fn notes_by_folder(&self, folder: Option<&Uuid>) -> Result<Vec<Note>> {
        let scope = match folder {
            Some(id) => FolderScope::In(*id),
            None => FolderScope::Unfiled,
        };
        let filter = NoteFilter {
            folder: Some(scope),
            ..Default::default()
        };
        Ok(query::apply(self.list_notes()?, &filter, SortOrder::Updated))
    }

    fn favorites(&self) -> Result<Vec<Note>> {
        let filter = NoteFilter {
            favorites_only: true,
            ..Default::default()
        };
        Ok(query::apply(self.list_notes()?, &filter, SortOrder::Updated))
    }
}
