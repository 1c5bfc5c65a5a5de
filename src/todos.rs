//! Simple to-do items, independent of notes

use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub completed: bool,
    pub created_at: NaiveDateTime,
}

/// Trim the text of a todo, nothing left means no todo
pub fn parse_text(text: &str) -> Option<String> {
    let text = text.trim();

    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Open todos first, keeping the order within open and completed todos
pub fn open_first(mut todos: Vec<Todo>) -> Vec<Todo> {
    // `sort_by_key` is stable
    todos.sort_by_key(|todo| todo.completed);
    todos
}
