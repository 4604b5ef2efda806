use notepocket::adapter::{AdapterState, Backend, StorageAdapter};
use notepocket::bulk::ImportPayload;
use notepocket::config::NotesConfig;
use notepocket::error::{NotesError, Result};
use notepocket::model::{FolderUpdate, NewFolder, NewNote, NoteUpdate};
use notepocket::store::access::{FileAccess, FileSelection, PathAccess};
use notepocket::store::file::temp_path;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn ready(config: NotesConfig) -> StorageAdapter {
    let adapter = StorageAdapter::new(config);
    adapter.initialize();
    adapter
}

fn reopen(path: &Path) -> StorageAdapter {
    let adapter = ready(NotesConfig::default());
    adapter.upgrade(&PathAccess::new(path)).unwrap();
    adapter
}

/// Always opens the given path, even if it does not exist.
struct OpenOnly(PathBuf);

impl FileAccess for OpenOnly {
    fn is_supported(&self) -> bool {
        true
    }

    fn select(&self) -> Result<FileSelection> {
        Ok(FileSelection::Open(self.0.clone()))
    }
}

#[test]
fn upgrade_preserves_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let adapter = ready(NotesConfig::default());

    let work = adapter.create_folder(NewFolder::new("Work", "#3b82f6")).unwrap();
    let home = adapter.create_folder(NewFolder::new("Home", "#388e3c")).unwrap();
    let a = adapter
        .create_note(NewNote::text("A", "first").in_folder(work.id).tagged(["x", "y"]))
        .unwrap();
    let b = adapter
        .create_note(NewNote::text("B", "second").in_folder(home.id))
        .unwrap();
    let c = adapter.create_note(NewNote::text("C", "third").favorite()).unwrap();
    adapter
        .update_note(
            &a.id,
            NoteUpdate {
                content: Some("edited".into()),
                ..Default::default()
            },
        )
        .unwrap();
    adapter
        .update_folder(
            &home.id,
            FolderUpdate {
                name: Some("House".into()),
                ..Default::default()
            },
        )
        .unwrap();
    adapter.delete_note(&c.id).unwrap();
    adapter.delete_folder(&work.id).unwrap();

    let notes_before = adapter.get_all_notes().unwrap();
    let folders_before = adapter.get_all_folders().unwrap();

    let report = adapter.upgrade(&PathAccess::new(&path)).unwrap();
    assert_eq!(report.notes, 2);
    assert_eq!(report.folders, 1);
    assert_eq!(adapter.state(), AdapterState::DurableActive);

    assert_eq!(adapter.get_all_notes().unwrap(), notes_before);
    assert_eq!(adapter.get_all_folders().unwrap(), folders_before);
    adapter.close().unwrap();

    // And it is all on disk.
    let reopened = reopen(&path);
    assert_eq!(reopened.get_all_notes().unwrap(), notes_before);
    assert_eq!(reopened.get_all_folders().unwrap(), folders_before);
    assert!(reopened.get_note(&a.id).unwrap().folder_id.is_none());
    assert_eq!(reopened.get_note(&b.id).unwrap().folder_id, Some(home.id));
}

#[test]
fn upgrade_merges_into_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");

    let first = ready(NotesConfig::default());
    first.upgrade(&PathAccess::new(&path)).unwrap();
    first.create_note(NewNote::text("Saved earlier", "")).unwrap();
    first.close().unwrap();
    drop(first);

    let second = ready(NotesConfig::default());
    second.create_note(NewNote::text("Made offline", "")).unwrap();
    second.upgrade(&PathAccess::new(&path)).unwrap();

    let titles: Vec<_> = second
        .get_all_notes()
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Saved earlier".to_string()));
    assert!(titles.contains(&"Made offline".to_string()));
}

#[test]
fn corrupt_file_leaves_volatile_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    fs::write(&path, "this is not a database").unwrap();

    let adapter = ready(NotesConfig::default());
    adapter.create_note(NewNote::text("Keep me", "")).unwrap();
    let status_before = adapter.status();
    let notes_before = adapter.get_all_notes().unwrap();

    let err = adapter.upgrade(&PathAccess::new(&path)).unwrap_err();
    assert!(matches!(err, NotesError::DeserializationFailed(_)));
    assert!(err.is_declined_upgrade());

    assert_eq!(adapter.state(), AdapterState::VolatileActive);
    assert_eq!(adapter.status(), status_before);
    assert_eq!(adapter.get_all_notes().unwrap(), notes_before);
    assert_eq!(fs::read_to_string(&path).unwrap(), "this is not a database");
}

#[test]
fn opening_missing_file_is_declined() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = ready(NotesConfig::default());
    let err = adapter
        .upgrade(&OpenOnly(dir.path().join("missing.json")))
        .unwrap_err();
    assert!(matches!(err, NotesError::DeserializationFailed(_)));
    assert_eq!(adapter.status().backend, Backend::Volatile);
}

#[test]
fn failed_initial_write_keeps_volatile_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    fs::create_dir(temp_path(&path)).unwrap();

    let adapter = ready(NotesConfig::default());
    adapter.create_note(NewNote::text("A", "")).unwrap();

    let err = adapter.upgrade(&PathAccess::new(&path)).unwrap_err();
    assert!(matches!(err, NotesError::WriteFailed(_)));
    assert_eq!(adapter.state(), AdapterState::VolatileActive);
    assert_eq!(adapter.get_all_notes().unwrap().len(), 1);

    // Once the obstacle is gone the same upgrade succeeds.
    fs::remove_dir(temp_path(&path)).unwrap();
    adapter.upgrade(&PathAccess::new(&path)).unwrap();
    assert_eq!(adapter.status().backend, Backend::Durable);
}

#[test]
fn force_save_surfaces_write_errors_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let adapter = ready(NotesConfig::periodic(Duration::from_secs(3600)));
    adapter.upgrade(&PathAccess::new(&path)).unwrap();
    adapter.create_note(NewNote::text("Pending", "")).unwrap();

    fs::create_dir(temp_path(&path)).unwrap();
    assert!(matches!(
        adapter.force_save(),
        Err(NotesError::WriteFailed(_))
    ));

    fs::remove_dir(temp_path(&path)).unwrap();
    adapter.force_save().unwrap();
    assert_eq!(reopen(&path).get_all_notes().unwrap().len(), 1);
}

#[test]
fn periodic_policy_flushes_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let adapter = ready(NotesConfig::periodic(Duration::from_secs(3600)));
    adapter.upgrade(&PathAccess::new(&path)).unwrap();
    adapter.create_note(NewNote::text("Late", "")).unwrap();

    assert!(reopen(&path).get_all_notes().unwrap().is_empty());
    adapter.close().unwrap();
    assert_eq!(reopen(&path).get_all_notes().unwrap().len(), 1);
}

#[test]
fn concurrent_writes_survive_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let adapter = Arc::new(ready(NotesConfig::default()));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || {
                for i in 0..25 {
                    adapter
                        .create_note(NewNote::text(format!("w{}-{}", w, i), ""))
                        .unwrap();
                }
            })
        })
        .collect();

    adapter.upgrade(&PathAccess::new(&path)).unwrap();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(adapter.get_all_notes().unwrap().len(), 100);
    adapter.close().unwrap();
    assert_eq!(reopen(&path).get_all_notes().unwrap().len(), 100);
}

#[test]
fn import_with_failed_write_counts_records_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let adapter = reopen(&path);
    fs::create_dir(temp_path(&path)).unwrap();

    let payload = ImportPayload::from_value(serde_json::json!({
        "folders": [{ "id": "w", "name": "Work", "color": "#3b82f6" }],
        "notes": [
            { "title": "A", "content": "", "type": "text", "folderId": "w" },
            { "title": "B", "content": "", "type": "text" }
        ]
    }))
    .unwrap();
    let summary = adapter.import_data(&payload).unwrap();

    assert_eq!(summary.imported_notes, 2);
    assert_eq!(summary.imported_folders, 1);
    assert_eq!(summary.skipped_notes, 0);
    assert!(summary.write_pending);
    assert_eq!(adapter.get_all_notes().unwrap().len(), 2);

    let work = &adapter.get_all_folders().unwrap()[0];
    let notes = adapter.get_all_notes().unwrap();
    let filed = notes.iter().find(|n| n.title == "A").unwrap();
    assert_eq!(filed.folder_id, Some(work.id));

    fs::remove_dir(temp_path(&path)).unwrap();
    adapter.close().unwrap();
    assert_eq!(reopen(&path).get_all_notes().unwrap().len(), 2);
}
