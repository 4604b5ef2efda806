//! Starter content for a fresh volatile session.

use crate::error::Result;
use crate::model::{NewFolder, NewNote};
use crate::store::DataStore;

const WELCOME: &str = "Welcome to NotePocket!

Notes live in memory until you choose a database file. After that every change is written to that file.

- Text notes for anything you want to keep
- Image and file notes for attachments
- Folders and tags to organize
- Search to find things again";

const PLANNING: &str = "Q1 goals

- [x] Local storage architecture
- [ ] File-based persistence
- [ ] Backup and restore";

const IDEAS: &str = "- Keyboard shortcuts
- Dark mode
- Drag and drop uploads";

/// Seed demo folders and notes. Does nothing if the store already holds data.
pub fn seed(store: &mut dyn DataStore) -> Result<bool> {
    if !store.list_notes()?.is_empty() || !store.list_folders()?.is_empty() {
        return Ok(false);
    }

    let work = store.create_folder(NewFolder::new("Work", "#1976d2"))?;
    store.create_folder(NewFolder::new("Personal", "#388e3c"))?;
    let ideas = store.create_folder(NewFolder::new("Ideas", "#f57c00"))?;

    store.create_note(
        NewNote::text("Welcome to NotePocket!", WELCOME)
            .tagged(["welcome", "guide"])
            .favorite(),
    )?;
    store.create_note(
        NewNote::text("Project Planning Notes", PLANNING)
            .in_folder(work.id)
            .tagged(["planning", "goals"]),
    )?;
    store.create_note(
        NewNote::text("Feature Ideas", IDEAS)
            .in_folder(ideas.id)
            .tagged(["ideas"]),
    )?;

    Ok(true)
}
