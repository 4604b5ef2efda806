use notepocket::adapter::StorageAdapter;
use notepocket::config::NotesConfig;
use notepocket::migration::{legacy_present, JsonKvStore, LegacyStore, MigrationService, NOTES_KEY};
use notepocket::store::access::PathAccess;
use notepocket::store::file::temp_path;
use std::fs;
use std::path::Path;

const LEGACY: &str = r##"{
  "folders": [
    { "id": 1, "name": "Work", "color": "#1976d2" },
    { "id": 2, "name": "Ideas", "color": "#f57c00" }
  ],
  "notes": [
    { "id": 1, "title": "Standup", "content": "notes", "type": "text", "folderId": 1, "tags": ["daily"] },
    { "id": 2, "title": "Moonshot", "content": "", "folderId": 2, "isFavorite": true },
    { "id": 3, "title": "Scan", "type": "file", "fileUrl": "data:application/pdf;base64,AA==",
      "fileName": "scan.pdf", "fileSize": 1, "fileMimeType": "application/pdf" }
  ],
  "theme": "dark"
}"##;

fn durable_adapter(db: &Path) -> StorageAdapter {
    let adapter = StorageAdapter::new(NotesConfig::default());
    adapter.initialize();
    adapter.upgrade(&PathAccess::new(db)).unwrap();
    adapter
}

#[test]
fn migration_is_idempotent_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("notes.json");
    let kv_path = dir.path().join("legacy.json");
    fs::write(&kv_path, LEGACY).unwrap();

    // First launch.
    {
        let adapter = durable_adapter(&db);
        let mut kv = JsonKvStore::new(&kv_path);
        let report = MigrationService::new().run(&adapter, &mut kv).unwrap();
        assert_eq!(report.folders_migrated, 2);
        assert_eq!(report.notes_migrated, 3);
        assert!(report.legacy_cleared);
        assert!(!legacy_present(&kv).unwrap());
        adapter.close().unwrap();
    }

    // Unrelated keys survive the cleanup.
    let remaining: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&kv_path).unwrap()).unwrap();
    assert_eq!(remaining["theme"], "dark");

    // Second launch: fresh service, same files.
    let adapter = durable_adapter(&db);
    let mut kv = JsonKvStore::new(&kv_path);
    let report = MigrationService::new().run(&adapter, &mut kv).unwrap();
    assert_eq!(report.notes_migrated, 0);

    let notes = adapter.get_all_notes().unwrap();
    let folders = adapter.get_all_folders().unwrap();
    assert_eq!(notes.len(), 3);
    assert_eq!(folders.len(), 2);

    let work = folders.iter().find(|f| f.name == "Work").unwrap();
    let standup = notes.iter().find(|n| n.title == "Standup").unwrap();
    assert_eq!(standup.folder_id, Some(work.id));
    let scan = notes.iter().find(|n| n.title == "Scan").unwrap();
    assert_eq!(
        scan.attachment.as_ref().map(|a| a.file_name.as_str()),
        Some("scan.pdf")
    );
}

#[test]
fn failed_write_leaves_nothing_to_duplicate_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("notes.json");
    let kv_path = dir.path().join("legacy.json");
    fs::write(&kv_path, LEGACY).unwrap();

    // First launch: the image cannot be written while migrating.
    {
        let adapter = durable_adapter(&db);
        fs::create_dir(temp_path(&db)).unwrap();

        let mut kv = JsonKvStore::new(&kv_path);
        let report = MigrationService::new().run(&adapter, &mut kv).unwrap();
        assert!(!report.legacy_cleared);
        assert_eq!(report.notes_migrated, 0);
        assert_eq!(report.skipped, 5);
        assert!(kv.read(NOTES_KEY).unwrap().is_some());
        assert!(adapter.get_all_notes().unwrap().is_empty());
        assert!(adapter.get_all_folders().unwrap().is_empty());

        fs::remove_dir(temp_path(&db)).unwrap();
        adapter.close().unwrap();
    }

    // Second launch migrates the same data once.
    let adapter = durable_adapter(&db);
    let mut kv = JsonKvStore::new(&kv_path);
    let report = MigrationService::new().run(&adapter, &mut kv).unwrap();
    assert!(report.legacy_cleared);
    adapter.close().unwrap();
    drop(adapter);

    let adapter = durable_adapter(&db);
    let notes = adapter.get_all_notes().unwrap();
    let folders = adapter.get_all_folders().unwrap();
    assert_eq!(notes.len(), 3);
    assert_eq!(folders.len(), 2);
    let work = folders.iter().find(|f| f.name == "Work").unwrap();
    let standup = notes.iter().find(|n| n.title == "Standup").unwrap();
    assert_eq!(standup.folder_id, Some(work.id));
}
