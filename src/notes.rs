//! Notes and the resolution of their optional fields

use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::markup::sanitize;

/// Title used when a note has none
pub const DEFAULT_TITLE: &str = "Untitled";

/// Background color used when a note has none
pub const DEFAULT_COLOR: &str = "#ffffff";

/// A note of a single user
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub text: String,
    pub color: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Raw input for a new note, every field may be missing
#[derive(Debug, Default)]
pub struct NoteDraft {
    pub folder_id: Option<Uuid>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
}

/// A new note with all defaults applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteFields {
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub text: String,
    pub color: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub is_archived: bool,
}

impl NoteDraft {
    /// Apply the defaults of every missing field
    pub fn resolve(self) -> NoteFields {
        NoteFields {
            folder_id: self.folder_id,
            title: resolve_title(self.title.as_deref()),
            text: resolve_text(self.text.as_deref()),
            color: resolve_color(self.color.as_deref()),
            category: resolve_category(self.category.as_deref()),
            tags: resolve_tags(self.tags.unwrap_or_default()),
            is_pinned: self.is_pinned.unwrap_or(false),
            is_archived: self.is_archived.unwrap_or(false),
        }
    }
}

/// Raw input for changing a note
///
/// A missing field is left alone, `folder_id` uses a nested option to allow clearing it
#[derive(Debug, Default)]
pub struct NotePatch {
    pub folder_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub color: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
}

/// Changes to a note with all defaults applied
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteChanges {
    pub folder_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub color: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
}

impl NotePatch {
    /// Apply the defaults of every provided field
    ///
    /// Providing an empty title resets it to the default title, same for the color
    pub fn resolve(self) -> NoteChanges {
        NoteChanges {
            folder_id: self.folder_id,
            title: self.title.as_deref().map(|title| resolve_title(Some(title))),
            text: self.text.as_deref().map(|text| resolve_text(Some(text))),
            color: self.color.as_deref().map(|color| resolve_color(Some(color))),
            category: self
                .category
                .map(|category| resolve_category(category.as_deref())),
            tags: self.tags.map(resolve_tags),
            is_pinned: self.is_pinned,
            is_archived: self.is_archived,
        }
    }
}

impl NoteChanges {
    /// Apply the changes to a note, refreshing `updated_at`
    pub fn apply(&self, note: &mut Note, now: NaiveDateTime) {
        if let Some(folder_id) = self.folder_id {
            note.folder_id = folder_id;
        }

        if let Some(title) = &self.title {
            note.title.clone_from(title);
        }

        if let Some(text) = &self.text {
            note.text.clone_from(text);
        }

        if let Some(color) = &self.color {
            note.color.clone_from(color);
        }

        if let Some(category) = &self.category {
            note.category.clone_from(category);
        }

        if let Some(tags) = &self.tags {
            note.tags.clone_from(tags);
        }

        if let Some(is_pinned) = self.is_pinned {
            note.is_pinned = is_pinned;
        }

        if let Some(is_archived) = self.is_archived {
            note.is_archived = is_archived;
        }

        note.updated_at = now;
    }
}

fn resolve_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => DEFAULT_TITLE.to_string(),
    }
}

fn resolve_text(text: Option<&str>) -> String {
    text.map(sanitize).unwrap_or_default()
}

fn resolve_color(color: Option<&str>) -> String {
    match color.map(str::trim) {
        Some(color) if !color.is_empty() => color.to_string(),
        _ => DEFAULT_COLOR.to_string(),
    }
}

fn resolve_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map(ToString::to_string)
}

/// Trim the tags, drop the empty ones and the duplicates
fn resolve_tags(tags: Vec<String>) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::with_capacity(tags.len());

    for tag in tags {
        let tag = tag.trim();

        if !tag.is_empty() && !resolved.iter().any(|existing| existing == tag) {
            resolved.push(tag.to_string());
        }
    }

    resolved
}
