//! Note query engine
//!
//! Turns the full set of notes of a user into the ordered list that is visible for a view. This
//! is a pure transformation: no storage access, no hidden state.

use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::markup::has_content;
use crate::notes::Note;

/// Category value that disables the category filter
pub const ALL_CATEGORIES: &str = "All";

/// Top-level scope of the notes
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// Everything that is not archived
    #[default]
    All,

    /// Pinned notes, archived or not
    Starred,

    /// Archived notes
    Archived,
}

impl View {
    /// Does the note belong to this view?
    fn includes(self, note: &Note) -> bool {
        match self {
            View::All => !note.is_archived,
            View::Starred => note.is_pinned,
            View::Archived => note.is_archived,
        }
    }
}

/// Unknown view name
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownView(pub String);

impl std::fmt::Display for UnknownView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, r#"Unknown view "{}""#, self.0)
    }
}

impl FromStr for View {
    type Err = UnknownView;

    fn from_str(view: &str) -> Result<Self, Self::Err> {
        match view {
            "" | "all" => Ok(View::All),
            "starred" => Ok(View::Starred),
            "archived" => Ok(View::Archived),
            other => Err(UnknownView(other.to_string())),
        }
    }
}

/// Category scope of the notes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// No filtering on category
    #[default]
    All,

    /// Only notes with exactly this category
    Only(String),
}

impl CategoryFilter {
    /// Create the filter from the selected category, where `All` (or nothing) disables it
    pub fn from_selection(category: Option<&str>) -> Self {
        match category {
            None | Some(ALL_CATEGORIES) => CategoryFilter::All,
            Some(category) => CategoryFilter::Only(category.to_string()),
        }
    }

    fn includes(&self, note: &Note) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => note.category.as_deref() == Some(category.as_str()),
        }
    }
}

/// How to deal with notes that have nothing to show
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayPolicy {
    /// Hide notes with blank text from every list, they are still stored and editable
    pub hide_empty_text: bool,
}

/// Everything that selects the visible notes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewParameters {
    /// The top-level view
    pub view: View,

    /// The selected category
    pub category: CategoryFilter,

    /// Free text to search for
    pub search: String,

    /// Only notes in this folder, when set
    pub folder: Option<Uuid>,
}

/// Does the (already lowercased) search term appear in the note?
fn matches_search(note: &Note, term: &str) -> bool {
    note.title.to_lowercase().contains(term)
        || note.text.to_lowercase().contains(term)
        || note
            .category
            .as_deref()
            .is_some_and(|category| category.to_lowercase().contains(term))
        || note.tags.iter().any(|tag| tag.to_lowercase().contains(term))
}

/// Compute the visible notes, in display order
///
/// Filters on view, category and search, in that order, and then moves pinned notes to the
/// front while keeping the input order within pinned and unpinned notes.
pub fn compute_visible_notes(
    notes: &[Note],
    parameters: &ViewParameters,
    policy: DisplayPolicy,
) -> Vec<Note> {
    let term = parameters.search.trim().to_lowercase();

    let (pinned, unpinned): (Vec<&Note>, Vec<&Note>) = notes
        .iter()
        .filter(|note| parameters.view.includes(note))
        .filter(|note| parameters.folder.is_none_or(|folder| note.folder_id == Some(folder)))
        .filter(|note| !policy.hide_empty_text || has_content(&note.text))
        .filter(|note| parameters.category.includes(note))
        .filter(|note| term.is_empty() || matches_search(note, &term))
        .partition(|note| note.is_pinned);

    pinned.into_iter().chain(unpinned).cloned().collect()
}
