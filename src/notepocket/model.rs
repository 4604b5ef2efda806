//! # Data Model
//!
//! Entities shared by every storage backend.
//!
//! - [`Note`]: a titled piece of content (`text`, `image` or `file`), optionally filed
//!   into a [`Folder`], with tags, a favorite flag, an optional attachment and a list of
//!   inline images.
//! - [`Folder`]: a named, colored container. Deleting a folder never deletes its notes;
//!   they become *unfiled* (`folder_id == None`).
//!
//! Records are created from [`NewNote`] / [`NewFolder`] (the store mints `id` and
//! timestamps) and changed with [`NoteUpdate`] / [`FolderUpdate`], which have merge
//! semantics: `None` fields are left untouched.
//!
//! The serialized shape is camelCase JSON, shared by the durable image and the
//! bulk export format:
//!
//! ```json
//! {
//!   "id": "…", "title": "A", "content": "", "type": "text", "tags": [],
//!   "folderId": "…", "isFavorite": false,
//!   "fileUrl": "…", "fileName": "a.pdf", "fileSize": 10, "fileMimeType": "application/pdf",
//!   "embeddedImages": [], "createdAt": "…", "updatedAt": "…"
//! }
//! ```

use crate::error::{NotesError, Result};
use crate::tags::normalize_tags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Text,
    Image,
    File,
}

impl NoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteType::Text => "text",
            NoteType::Image => "image",
            NoteType::File => "file",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = NotesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(NoteType::Text),
            "image" => Ok(NoteType::Image),
            "file" => Ok(NoteType::File),
            other => Err(NotesError::ValidationFailed(format!(
                "unknown note type: {}",
                other
            ))),
        }
    }
}

/// Binary attachment of an `image` or `file` note. The four fields are always
/// present together, so a note either has a complete attachment or none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_mime_type: String,
}

/// Inline image referenced from note content as `![alt](embedded:<id>)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(flatten)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub embedded_images: Vec<EmbeddedImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Build a stored note from creation input, minting the id and both timestamps.
    pub fn from_new(new: NewNote, now: DateTime<Utc>) -> Result<Self> {
        validate_title(&new.title)?;
        Ok(Self {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            note_type: new.note_type,
            tags: normalize_tags(new.tags),
            folder_id: new.folder_id,
            is_favorite: new.is_favorite,
            attachment: new.attachment,
            embedded_images: new.embedded_images,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merge a partial update. `updated_at` never moves backwards, even if the
    /// wall clock does.
    pub fn apply(&mut self, update: NoteUpdate, now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }

        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(folder_id) = update.folder_id {
            self.folder_id = folder_id;
        }
        if let Some(is_favorite) = update.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(attachment) = update.attachment {
            self.attachment = attachment;
        }
        if let Some(images) = update.embedded_images {
            self.embedded_images = images;
        }

        self.updated_at = now.max(self.updated_at);
        Ok(())
    }

    pub fn is_unfiled(&self) -> bool {
        self.folder_id.is_none()
    }

    /// Embedded images whose marker no longer appears in `content`.
    pub fn unreferenced_images(&self) -> Vec<&EmbeddedImage> {
        let referenced: Vec<String> = crate::content::embedded_refs(&self.content)
            .into_iter()
            .map(|r| r.image_id)
            .collect();
        self.embedded_images
            .iter()
            .filter(|img| !referenced.contains(&img.id))
            .collect()
    }

    /// Strip identity so the record can be replayed into another store.
    pub fn to_new(&self) -> NewNote {
        NewNote {
            title: self.title.clone(),
            content: self.content.clone(),
            note_type: self.note_type,
            tags: self.tags.clone(),
            folder_id: self.folder_id,
            is_favorite: self.is_favorite,
            attachment: self.attachment.clone(),
            embedded_images: self.embedded_images.clone(),
        }
    }
}

/// Creation input for a note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub note_type: NoteType,
    pub tags: Vec<String>,
    pub folder_id: Option<Uuid>,
    pub is_favorite: bool,
    pub attachment: Option<Attachment>,
    pub embedded_images: Vec<EmbeddedImage>,
}

impl NewNote {
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(
        note_type: NoteType,
        title: impl Into<String>,
        attachment: Attachment,
    ) -> Self {
        Self {
            title: title.into(),
            note_type,
            attachment: Some(attachment),
            ..Default::default()
        }
    }

    pub fn in_folder(mut self, folder_id: Uuid) -> Self {
        self.folder_id = Some(folder_id);
        self
    }

    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }
}

/// Partial note update. `folder_id` and `attachment` are doubly optional:
/// `Some(None)` clears the field, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub folder_id: Option<Option<Uuid>>,
    pub is_favorite: Option<bool>,
    pub attachment: Option<Option<Attachment>>,
    pub embedded_images: Option<Vec<EmbeddedImage>>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    pub fn from_new(new: NewFolder, now: DateTime<Utc>) -> Result<Self> {
        validate_folder_name(&new.name)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name,
            color: new.color,
            created_at: now,
        })
    }

    pub fn apply(&mut self, update: FolderUpdate) -> Result<()> {
        if let Some(name) = update.name {
            validate_folder_name(&name)?;
            self.name = name;
        }
        if let Some(color) = update.color {
            self.color = color;
        }
        Ok(())
    }

    pub fn to_new(&self) -> NewFolder {
        NewFolder {
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFolder {
    pub name: String,
    pub color: String,
}

impl NewFolder {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(NotesError::ValidationFailed(
            "note title cannot be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_folder_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(NotesError::ValidationFailed(
            "folder name cannot be empty".to_string(),
        ));
    }
    Ok(())
}
