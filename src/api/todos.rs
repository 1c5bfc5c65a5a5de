//! Todo API management

use axum::Extension;
use axum::response::Sse;
use axum::response::sse::Event;
use chrono::NaiveDateTime;
use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::storage::CreateTodoValues;
use crate::storage::Storage;
use crate::storage::UpdateTodoValues;
use crate::todos::Todo;
use crate::todos::open_first;
use crate::todos::parse_text;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::live::snapshot_events;
use super::utils::fetch_todo;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
    pub created_at: NaiveDateTime,
}

impl TodoResponse {
    fn from_todo(todo: Todo) -> Self {
        Self {
            id: todo.id,
            text: todo.text,
            completed: todo.completed,
            created_at: todo.created_at,
        }
    }

    /// Open todos first
    fn from_todo_multiple(todos: Vec<Todo>) -> Vec<Self> {
        open_first(todos).into_iter().map(Self::from_todo).collect()
    }
}

fn invalid_text() -> Error {
    Error::bad_request("Invalid todo").with_description("The text of a todo can not be empty")
}

pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<TodoResponse>>, Error> {
    let todos = storage
        .find_all_todos(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(TodoResponse::from_todo_multiple(todos)))
}

/// Follow the todos, an event with the full list is sent on every change
pub async fn live<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let snapshots = storage
        .subscribe_todos(&current_user.id)
        .into_stream()
        .map(TodoResponse::from_todo_multiple);

    snapshot_events("todos", snapshots)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoForm {
    text: String,
}

/// Create an open todo
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "text": "Water the plants" }' \
///     http://localhost:6000/api/todos
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateTodoForm>,
) -> Result<Success<TodoResponse>, Error> {
    let text = parse_text(&form.text).ok_or_else(invalid_text)?;

    let values = CreateTodoValues {
        user: &current_user,
        text: &text,
    };

    let todo = storage
        .create_todo(&values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::created(TodoResponse::from_todo(todo)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoForm {
    text: Option<String>,
    completed: Option<bool>,
}

pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(todo_id): PathParameters<Uuid>,
    Form(form): Form<UpdateTodoForm>,
) -> Result<Success<TodoResponse>, Error> {
    let todo = fetch_todo(&storage, &current_user.id, &todo_id).await?;

    let text = match form.text.as_deref() {
        Some(text) => Some(parse_text(text).ok_or_else(invalid_text)?),
        None => None,
    };

    let values = UpdateTodoValues {
        text: text.as_deref(),
        completed: form.completed,
    };

    storage
        .update_todo(&todo, &values)
        .await
        .map(|todo| Success::ok(TodoResponse::from_todo(todo)))
        .map_err(|err| Error::from_storage(err, "Todo"))
}

/// Flip the completion state
pub async fn toggle<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(todo_id): PathParameters<Uuid>,
) -> Result<Success<TodoResponse>, Error> {
    let todo = fetch_todo(&storage, &current_user.id, &todo_id).await?;

    let values = UpdateTodoValues {
        text: None,
        completed: Some(!todo.completed),
    };

    storage
        .update_todo(&todo, &values)
        .await
        .map(|todo| Success::ok(TodoResponse::from_todo(todo)))
        .map_err(|err| Error::from_storage(err, "Todo"))
}

pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(todo_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let todo = fetch_todo(&storage, &current_user.id, &todo_id).await?;

    storage
        .delete_todo(&todo)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}
