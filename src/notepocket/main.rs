use chrono::{DateTime, Utc};
use clap::Parser;
use colored::*;
use directories::ProjectDirs;
use notepocket::adapter::StorageAdapter;
use notepocket::bulk::ImportPayload;
use notepocket::config::NotesConfig;
use notepocket::error::{NotesError, Result};
use notepocket::migration::{legacy_present, JsonKvStore, MigrationService};
use notepocket::model::{Attachment, Folder, NewFolder, NewNote, Note, NoteType, NoteUpdate};
use notepocket::query::{FolderScope, NoteFilter, SortOrder};
use notepocket::store::access::PathAccess;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

mod args;
use args::{Cli, Commands};

const DB_FILENAME: &str = "notepocket.json";
const LEGACY_FILENAME: &str = "legacy.json";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct AppContext {
    adapter: StorageAdapter,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ctx = init_context(&cli);

    let result = match cli.command {
        Some(Commands::Add {
            title,
            content,
            note_type,
            tags,
            folder,
            favorite,
            attach,
        }) => handle_add(
            &ctx,
            title,
            content,
            note_type,
            tags,
            folder,
            favorite,
            attach,
        ),
        Some(Commands::List {
            search,
            folder,
            unfiled,
            favorites,
            tags,
            note_type,
            sort,
        }) => handle_list(
            &ctx, search, folder, unfiled, favorites, tags, note_type, &sort,
        ),
        Some(Commands::Show { id }) => handle_show(&ctx, &id),
        Some(Commands::Edit {
            id,
            title,
            content,
            tags,
            folder,
            unfile,
            favorite,
            unfavorite,
        }) => handle_edit(
            &ctx, &id, title, content, tags, folder, unfile, favorite, unfavorite,
        ),
        Some(Commands::Rm { ids }) => handle_rm(&ctx, &ids),
        Some(Commands::FolderAdd { name, color }) => handle_folder_add(&ctx, name, color),
        Some(Commands::Folders) => handle_folders(&ctx),
        Some(Commands::FolderRm { folder }) => handle_folder_rm(&ctx, &folder),
        Some(Commands::Search { term }) => handle_search(&ctx, &term),
        Some(Commands::Export { output }) => handle_export(&ctx, output),
        Some(Commands::Import { path }) => handle_import(&ctx, &path),
        Some(Commands::Migrate { legacy }) => handle_migrate(&ctx, legacy),
        Some(Commands::Status) => handle_status(&ctx),
        None => handle_list(
            &ctx,
            None,
            None,
            false,
            false,
            Vec::new(),
            None,
            "updated",
        ),
    };

    // Always close so pending writes land, but report the command's error first.
    let closed = ctx.adapter.close();
    result?;
    closed
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_env("NOTEPOCKET_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn init_context(cli: &Cli) -> AppContext {
    let dirs = ProjectDirs::from("com", "notepocket", "notepocket");
    let fallback = PathBuf::from(".notepocket");
    let config_dir = dirs
        .as_ref()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| fallback.clone());
    let data_dir = dirs
        .as_ref()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or(fallback);

    let config = NotesConfig::load(&config_dir).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config");
        NotesConfig::default()
    });

    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database_file.clone())
        .unwrap_or_else(|| data_dir.join(DB_FILENAME));
    let legacy_path = cli
        .legacy
        .clone()
        .or_else(|| config.legacy_file.clone())
        .unwrap_or_else(|| data_dir.join(LEGACY_FILENAME));

    let adapter = StorageAdapter::new(config);
    adapter.initialize();

    match adapter.upgrade(&PathAccess::new(&db_path)) {
        Ok(report) => debug!(
            path = %report.path.display(),
            notes = report.notes,
            "Using durable store"
        ),
        Err(e) => {
            if !e.is_declined_upgrade() {
                error!(error = %e, "Durable store unavailable");
            }
            eprintln!(
                "{}",
                format!("Warning: {}. Changes in this session will not be saved.", e).yellow()
            );
        }
    }

    migrate_on_startup(&adapter, legacy_path);

    AppContext { adapter }
}

/// Run the one-shot legacy migration before any command reads data. Never fatal.
fn migrate_on_startup(adapter: &StorageAdapter, legacy_path: PathBuf) {
    let mut kv = JsonKvStore::new(legacy_path);
    match legacy_present(&kv) {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            warn!(path = %kv.path().display(), error = %e, "Cannot read legacy data");
            return;
        }
    }

    match MigrationService::new().run(adapter, &mut kv) {
        Ok(report) if report.legacy_cleared => eprintln!(
            "{}",
            format!(
                "Migrated {} notes and {} folders from {}",
                report.notes_migrated,
                report.folders_migrated,
                kv.path().display()
            )
            .green()
        ),
        Ok(_) => eprintln!(
            "{}",
            format!(
                "Warning: legacy data in {} could not be migrated yet.",
                kv.path().display()
            )
            .yellow()
        ),
        Err(e) => eprintln!(
            "{}",
            format!("Warning: legacy migration failed: {}", e).yellow()
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_add(
    ctx: &AppContext,
    title: String,
    content: Option<String>,
    note_type: Option<String>,
    tags: Vec<String>,
    folder: Option<String>,
    favorite: bool,
    attach: Option<PathBuf>,
) -> Result<()> {
    let attachment = attach.as_deref().map(attachment_from_path).transpose()?;
    let note_type = match (note_type, &attachment) {
        (Some(kind), _) => kind.parse::<NoteType>()?,
        (None, Some(a)) if a.file_mime_type.starts_with("image/") => NoteType::Image,
        (None, Some(_)) => NoteType::File,
        (None, None) => NoteType::Text,
    };
    let folder_id = folder
        .map(|key| resolve_folder(ctx, &key))
        .transpose()?;

    let note = ctx.adapter.create_note(NewNote {
        title,
        content: content.unwrap_or_default(),
        note_type,
        tags,
        folder_id,
        is_favorite: favorite,
        attachment,
        embedded_images: Vec::new(),
    })?;
    println!(
        "{}",
        format!("Created note {}: {}", short_id(&note.id), note.title).green()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_list(
    ctx: &AppContext,
    search: Option<String>,
    folder: Option<String>,
    unfiled: bool,
    favorites: bool,
    tags: Vec<String>,
    note_type: Option<String>,
    sort: &str,
) -> Result<()> {
    let order: SortOrder = sort.parse().map_err(NotesError::ValidationFailed)?;
    let folder = match (folder, unfiled) {
        (Some(key), _) => Some(FolderScope::In(resolve_folder(ctx, &key)?)),
        (None, true) => Some(FolderScope::Unfiled),
        (None, false) => None,
    };
    let filter = NoteFilter {
        query: search,
        note_type: note_type.map(|t| t.parse()).transpose()?,
        folder,
        tags,
        favorites_only: favorites,
    };

    let notes = ctx.adapter.query_notes(&filter, order)?;
    print_notes(&notes, &folder_names(ctx)?);
    Ok(())
}

fn handle_show(ctx: &AppContext, id: &str) -> Result<()> {
    let note = ctx.adapter.get_note(&resolve_note(ctx, id)?)?;
    let folders = folder_names(ctx)?;

    let star = if note.is_favorite { " ★" } else { "" };
    println!("{}{}", note.title.bold(), star.yellow());
    println!("{}", note.id.to_string().dimmed());
    println!("--------------------------------");
    println!("type:     {}", note.note_type);
    let folder = note
        .folder_id
        .and_then(|id| folders.get(&id).cloned())
        .unwrap_or_else(|| "(unfiled)".to_string());
    println!("folder:   {}", folder);
    if !note.tags.is_empty() {
        println!("tags:     {}", note.tags.join(", ").cyan());
    }
    if let Some(attachment) = &note.attachment {
        println!(
            "file:     {} ({}, {} bytes)",
            attachment.file_name, attachment.file_mime_type, attachment.file_size
        );
    }
    if !note.embedded_images.is_empty() {
        println!(
            "images:   {} ({} unreferenced)",
            note.embedded_images.len(),
            note.unreferenced_images().len()
        );
    }
    println!("created:  {}", format_time_ago(note.created_at).trim());
    println!("updated:  {}", format_time_ago(note.updated_at).trim());
    println!("--------------------------------");
    println!("{}", note.content);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_edit(
    ctx: &AppContext,
    id: &str,
    title: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
    folder: Option<String>,
    unfile: bool,
    favorite: bool,
    unfavorite: bool,
) -> Result<()> {
    let id = resolve_note(ctx, id)?;
    let folder_id = match (folder, unfile) {
        (Some(key), _) => Some(Some(resolve_folder(ctx, &key)?)),
        (None, true) => Some(None),
        (None, false) => None,
    };
    let is_favorite = match (favorite, unfavorite) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };
    let update = NoteUpdate {
        title,
        content,
        tags,
        folder_id,
        is_favorite,
        ..Default::default()
    };

    if update.is_empty() {
        println!("{}", "Nothing to change.".yellow());
        return Ok(());
    }

    let note = ctx.adapter.update_note(&id, update)?;
    println!(
        "{}",
        format!("Updated note {}: {}", short_id(&note.id), note.title).green()
    );
    Ok(())
}

fn handle_rm(ctx: &AppContext, ids: &[String]) -> Result<()> {
    let resolved = ids
        .iter()
        .map(|id| resolve_note(ctx, id))
        .collect::<Result<Vec<_>>>()?;
    for id in resolved {
        ctx.adapter.delete_note(&id)?;
        println!("{}", format!("Deleted note {}", short_id(&id)).green());
    }
    Ok(())
}

fn handle_folder_add(ctx: &AppContext, name: String, color: String) -> Result<()> {
    let folder = ctx.adapter.create_folder(NewFolder::new(name, color))?;
    println!(
        "{}",
        format!("Created folder {}: {}", short_id(&folder.id), folder.name).green()
    );
    Ok(())
}

fn handle_folders(ctx: &AppContext) -> Result<()> {
    let folders = ctx.adapter.get_all_folders()?;
    if folders.is_empty() {
        println!("No folders.");
        return Ok(());
    }
    let notes = ctx.adapter.get_all_notes()?;
    for folder in &folders {
        print_folder(folder, &notes);
    }
    Ok(())
}

fn handle_folder_rm(ctx: &AppContext, key: &str) -> Result<()> {
    let id = resolve_folder(ctx, key)?;
    let folder = ctx.adapter.get_folder(&id)?;
    ctx.adapter.delete_folder(&id)?;
    println!(
        "{}",
        format!("Deleted folder {} (its notes are now unfiled)", folder.name).green()
    );
    Ok(())
}

fn handle_search(ctx: &AppContext, term: &str) -> Result<()> {
    let notes = ctx.adapter.search(term)?;
    print_notes(&notes, &folder_names(ctx)?);
    Ok(())
}

fn handle_export(ctx: &AppContext, output: Option<PathBuf>) -> Result<()> {
    let data = ctx.adapter.export_data()?;
    let json = data.to_json()?;
    match output {
        Some(path) => {
            fs::write(&path, json)?;
            println!(
                "{}",
                format!(
                    "Exported {} notes and {} folders to {}",
                    data.notes.len(),
                    data.folders.len(),
                    path.display()
                )
                .green()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn handle_import(ctx: &AppContext, path: &Path) -> Result<()> {
    let json = fs::read_to_string(path)?;
    let payload = ImportPayload::from_json(&json)?;
    let summary = ctx.adapter.import_data(&payload)?;
    println!(
        "{}",
        format!(
            "Imported {} notes and {} folders",
            summary.imported_notes, summary.imported_folders
        )
        .green()
    );
    let skipped = summary.skipped_notes + summary.skipped_folders;
    if skipped > 0 {
        println!("{}", format!("Skipped {} invalid records", skipped).yellow());
    }
    if summary.write_pending {
        eprintln!(
            "{}",
            "Warning: imported records are not saved to disk yet.".yellow()
        );
    }
    Ok(())
}

fn handle_migrate(ctx: &AppContext, legacy: PathBuf) -> Result<()> {
    let mut kv = JsonKvStore::new(legacy);
    let report = MigrationService::new().run(&ctx.adapter, &mut kv)?;
    if report.folders_migrated == 0 && report.notes_migrated == 0 && report.skipped == 0 {
        println!("{}", "No legacy data to migrate.".dimmed());
        return Ok(());
    }
    println!(
        "{}",
        format!(
            "Migrated {} notes and {} folders",
            report.notes_migrated, report.folders_migrated
        )
        .green()
    );
    if report.skipped > 0 {
        println!(
            "{}",
            format!("Skipped {} records", report.skipped).yellow()
        );
    }
    if !report.legacy_cleared {
        println!(
            "{}",
            format!("Legacy data kept in {}", kv.path().display()).yellow()
        );
    }
    Ok(())
}

fn handle_status(ctx: &AppContext) -> Result<()> {
    let status = ctx.adapter.status();
    println!("backend:  {}", status.backend);
    println!("state:    {}", ctx.adapter.state());
    match &status.path {
        Some(path) => println!("file:     {}", path.display()),
        None => println!("file:     {}", "(none, changes are not saved)".yellow()),
    }
    println!("notes:    {}", ctx.adapter.get_all_notes()?.len());
    println!("folders:  {}", ctx.adapter.get_all_folders()?.len());
    Ok(())
}

fn folder_names(ctx: &AppContext) -> Result<HashMap<Uuid, String>> {
    Ok(ctx
        .adapter
        .get_all_folders()?
        .into_iter()
        .map(|f| (f.id, f.name))
        .collect())
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Normalized id prefix. Blank keys would match everything.
fn lookup_key(key: &str, kind: &str) -> Result<String> {
    let needle = key.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(NotesError::ValidationFailed(format!("empty {} id", kind)));
    }
    Ok(needle)
}

fn resolve_note(ctx: &AppContext, key: &str) -> Result<Uuid> {
    let needle = lookup_key(key, "note")?;
    let matches = ctx
        .adapter
        .get_all_notes()?
        .into_iter()
        .map(|n| n.id)
        .filter(|id| id.to_string().starts_with(&needle))
        .collect::<Vec<_>>();
    pick(matches, "note", key)
}

/// Folders resolve by exact name first, then by id prefix.
fn resolve_folder(ctx: &AppContext, key: &str) -> Result<Uuid> {
    let needle = lookup_key(key, "folder")?;
    let folders = ctx.adapter.get_all_folders()?;
    let by_name: Vec<Uuid> = folders
        .iter()
        .filter(|f| f.name.eq_ignore_ascii_case(key.trim()))
        .map(|f| f.id)
        .collect();
    if by_name.len() == 1 {
        return Ok(by_name[0]);
    }
    let by_id = folders
        .iter()
        .map(|f| f.id)
        .filter(|id| id.to_string().starts_with(&needle))
        .collect::<Vec<_>>();
    pick(by_id, "folder", key)
}

fn pick(matches: Vec<Uuid>, kind: &str, key: &str) -> Result<Uuid> {
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(NotesError::ValidationFailed(format!(
            "no {} matches '{}'",
            kind, key
        ))),
        _ => Err(NotesError::ValidationFailed(format!(
            "'{}' matches more than one {}",
            key, kind
        ))),
    }
}

fn attachment_from_path(path: &Path) -> Result<Attachment> {
    let metadata = fs::metadata(path)?;
    let absolute = fs::canonicalize(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(Attachment {
        file_url: format!("file://{}", absolute.display()),
        file_name,
        file_size: metadata.len(),
        file_mime_type: guess_mime(path).to_string(),
    })
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn print_folder(folder: &Folder, notes: &[Note]) {
    let count = notes
        .iter()
        .filter(|n| n.folder_id == Some(folder.id))
        .count();
    println!(
        "{} {} {} {}",
        short_id(&folder.id).yellow(),
        folder.name.bold(),
        folder.color.dimmed(),
        format!("({} notes)", count).dimmed()
    );
}

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;
const FAVORITE_MARKER: &str = "★";

fn print_notes(notes: &[Note], folders: &HashMap<Uuid, String>) {
    if notes.is_empty() {
        println!("No notes found.");
        return;
    }

    for note in notes {
        let id_str = format!("{} ", short_id(&note.id));
        let left_prefix = if note.is_favorite {
            format!("{} ", FAVORITE_MARKER)
        } else {
            "  ".to_string()
        };

        let folder_suffix = note
            .folder_id
            .and_then(|id| folders.get(&id))
            .map(|name| format!(" [{}]", name))
            .unwrap_or_default();

        let content_preview: String = note
            .content
            .chars()
            .take(50)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        let title_content = if content_preview.is_empty() {
            format!("{}{}", note.title, folder_suffix)
        } else {
            format!("{}{} {}", note.title, folder_suffix, content_preview)
        };

        let fixed_width = left_prefix.width() + id_str.width() + TIME_WIDTH;
        let available = LINE_WIDTH.saturating_sub(fixed_width);
        let title_display = truncate_to_width(&title_content, available);
        let padding = available.saturating_sub(title_display.width());

        println!(
            "{}{}{}{}{}",
            left_prefix.yellow(),
            id_str.yellow(),
            title_display,
            " ".repeat(padding),
            format_time_ago(note.updated_at).dimmed()
        );
    }
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
