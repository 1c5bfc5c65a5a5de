//! Utility functions for the API
//!
//! Records of other users are reported as not found, their existence is not leaked

use uuid::Uuid;

use crate::api::Error;
use crate::categories::Category;
use crate::folders::Folder;
use crate::notes::Note;
use crate::storage::Storage;
use crate::todos::Todo;

/// Fetch a note of the owner from storage
pub async fn fetch_note<S: Storage>(
    storage: &S,
    owner: &Uuid,
    note_id: &Uuid,
) -> Result<Note, Error> {
    storage
        .find_single_note_by_id(owner, note_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Note not found")), Ok)
}

/// Fetch a category the owner created from storage
pub async fn fetch_category<S: Storage>(
    storage: &S,
    owner: &Uuid,
    name: &str,
) -> Result<Category, Error> {
    storage
        .find_single_category_by_name(owner, name)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Category not found")), Ok)
}

/// Fetch a todo of the owner from storage
pub async fn fetch_todo<S: Storage>(
    storage: &S,
    owner: &Uuid,
    todo_id: &Uuid,
) -> Result<Todo, Error> {
    storage
        .find_single_todo_by_id(owner, todo_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Todo not found")), Ok)
}

/// Fetch a folder of the owner from storage
pub async fn fetch_folder<S: Storage>(
    storage: &S,
    owner: &Uuid,
    folder_id: &Uuid,
) -> Result<Folder, Error> {
    storage
        .find_single_folder_by_id(owner, folder_id)
        .await
        .map_err(Error::internal_server_error)?
        .map_or_else(|| Err(Error::not_found("Folder not found")), Ok)
}
