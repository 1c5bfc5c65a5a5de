//! Categories: a fixed predefined set plus the categories users add themselves

use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::notes::Note;
use crate::query::ALL_CATEGORIES;

/// Categories every user has, these can not be deleted
pub const PREDEFINED_CATEGORIES: [&str; 5] = ["Personal", "Work", "Study", "Ideas", "To-Do"];

/// Category notes get when their category is deleted
pub const UNCATEGORIZED: &str = "Uncategorized";

/// A category created by a user
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
}

/// Is the name one of the predefined categories?
pub fn is_predefined(name: &str) -> bool {
    PREDEFINED_CATEGORIES.contains(&name)
}

/// Reasons a category name can not be used for a new category
#[derive(Debug, PartialEq, Eq)]
pub enum InvalidName {
    /// Nothing left after trimming
    Empty,

    /// Clashes with a predefined category
    Predefined,

    /// Clashes with a value with a special meaning
    Reserved,
}

impl std::fmt::Display for InvalidName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidName::Empty => write!(f, "Category name can not be empty"),
            InvalidName::Predefined => write!(f, "Category is predefined"),
            InvalidName::Reserved => write!(f, "Category name is reserved"),
        }
    }
}

/// Trim and validate the name of a new category
pub fn parse_name(name: &str) -> Result<String, InvalidName> {
    let name = name.trim();

    if name.is_empty() {
        Err(InvalidName::Empty)
    } else if is_predefined(name) {
        Err(InvalidName::Predefined)
    } else if name == ALL_CATEGORIES || name == UNCATEGORIZED {
        Err(InvalidName::Reserved)
    } else {
        Ok(name.to_string())
    }
}

/// All category names available to a user: predefined first, then their own
pub fn available_names(categories: &[Category]) -> Vec<String> {
    PREDEFINED_CATEGORIES
        .iter()
        .map(ToString::to_string)
        .chain(categories.iter().map(|category| category.name.clone()))
        .collect()
}

/// Move the notes of a deleted category to [`UNCATEGORIZED`]
///
/// Returns how many notes changed
pub fn reassign_notes<'a, I>(notes: I, category: &str, now: NaiveDateTime) -> usize
where
    I: IntoIterator<Item = &'a mut Note>,
{
    let mut reassigned = 0;

    for note in notes {
        if note.category.as_deref() == Some(category) {
            note.category = Some(UNCATEGORIZED.to_string());
            note.updated_at = now;
            reassigned += 1;
        }
    }

    reassigned
}
