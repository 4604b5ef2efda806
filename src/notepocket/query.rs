//! Read-side helpers shared by every backend: text search, filtering and sorting.
//!
//! Search is a case-insensitive substring match over the title, the content, each
//! tag and the attachment file name. A blank query matches everything.

use crate::model::{Note, NoteType};
use std::cmp::Ordering;
use uuid::Uuid;

pub fn matches_query(note: &Note, query: &str) -> bool {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }

    note.title.to_lowercase().contains(&term)
        || note.content.to_lowercase().contains(&term)
        || note.tags.iter().any(|t| t.to_lowercase().contains(&term))
        || note
            .attachment
            .as_ref()
            .is_some_and(|a| a.file_name.to_lowercase().contains(&term))
}

pub fn search(notes: Vec<Note>, query: &str) -> Vec<Note> {
    notes
        .into_iter()
        .filter(|n| matches_query(n, query))
        .collect()
}

/// Which folder a filter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderScope {
    In(Uuid),
    Unfiled,
}

impl FolderScope {
    fn matches(self, note: &Note) -> bool {
        match self {
            FolderScope::In(id) => note.folder_id == Some(id),
            FolderScope::Unfiled => note.folder_id.is_none(),
        }
    }
}

/// Combined note filter. Empty fields don't restrict; `tags` requires every listed
/// tag to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub query: Option<String>,
    pub note_type: Option<NoteType>,
    pub folder: Option<FolderScope>,
    pub tags: Vec<String>,
    pub favorites_only: bool,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(query) = &self.query {
            if !matches_query(note, query) {
                return false;
            }
        }
        if let Some(note_type) = self.note_type {
            if note.note_type != note_type {
                return false;
            }
        }
        if let Some(folder) = self.folder {
            if !folder.matches(note) {
                return false;
            }
        }
        if self.favorites_only && !note.is_favorite {
            return false;
        }
        self.tags.iter().all(|t| note.tags.contains(t))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently updated first.
    #[default]
    Updated,
    Title,
    Type,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "updated" | "date" => Ok(SortOrder::Updated),
            "title" => Ok(SortOrder::Title),
            "type" => Ok(SortOrder::Type),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

pub fn sort_notes(notes: &mut [Note], order: SortOrder) {
    notes.sort_by(|a, b| match order {
        SortOrder::Updated => by_recency(a, b),
        SortOrder::Title => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| by_recency(a, b)),
        SortOrder::Type => a
            .note_type
            .as_str()
            .cmp(b.note_type.as_str())
            .then_with(|| by_recency(a, b)),
    });
}

fn by_recency(a: &Note, b: &Note) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn apply(notes: Vec<Note>, filter: &NoteFilter, order: SortOrder) -> Vec<Note> {
    let mut matched: Vec<Note> = notes.into_iter().filter(|n| filter.matches(n)).collect();
    sort_notes(&mut matched, order);
    matched
}
