//! Note API management

use axum::Extension;
use axum::response::Sse;
use axum::response::sse::Event;
use chrono::NaiveDateTime;
use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use uuid::Uuid;

use crate::board::NoteBoard;
use crate::notes::Note;
use crate::notes::NoteChanges;
use crate::notes::NoteDraft;
use crate::notes::NotePatch;
use crate::query::CategoryFilter;
use crate::query::DisplayPolicy;
use crate::query::View;
use crate::query::ViewParameters;
use crate::query::compute_visible_notes;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;
use super::live::snapshot_events;
use super::utils::fetch_folder;
use super::utils::fetch_note;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: Uuid,
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

impl NoteResponse {
    fn from_note(note: Note) -> Self {
        Self {
            id: note.id,
            folder_id: note.folder_id,
            title: note.title,
            text: note.text,
            color: note.color,
            category: note.category,
            tags: note.tags,
            is_pinned: note.is_pinned,
            is_archived: note.is_archived,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }

    fn from_note_multiple(notes: Vec<Note>) -> Vec<Self> {
        notes.into_iter().map(Self::from_note).collect::<Vec<Self>>()
    }
}

/// Selection of the visible notes, all optional
#[derive(Debug, Default, Deserialize)]
pub struct NotesQuery {
    view: Option<String>,
    category: Option<String>,
    search: Option<String>,
    folder: Option<Uuid>,
}

impl NotesQuery {
    fn into_parameters(self) -> Result<ViewParameters, Error> {
        let view = self
            .view
            .as_deref()
            .unwrap_or_default()
            .parse::<View>()
            .map_err(Error::bad_request)?;

        Ok(ViewParameters {
            view,
            category: CategoryFilter::from_selection(self.category.as_deref()),
            search: self.search.unwrap_or_default(),
            folder: self.folder,
        })
    }
}

/// List the visible notes, pinned notes first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:6000/api/notes?view=all&category=Work&search=groceries'
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(policy): Extension<DisplayPolicy>,
    current_user: CurrentUser<S>,
    QueryParameters(query): QueryParameters<NotesQuery>,
) -> Result<Success<Vec<NoteResponse>>, Error> {
    let parameters = query.into_parameters()?;

    let notes = storage
        .find_all_notes(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    let visible = compute_visible_notes(&notes, &parameters, policy);

    Ok(Success::ok(NoteResponse::from_note_multiple(visible)))
}

/// Follow the visible notes, an event with the full list is sent on every change
///
/// Request:
/// ```sh
/// curl -N -H 'Authorization: Bearer tokentokentoken' \
///     'http://localhost:6000/api/notes/live?view=starred'
/// ```
pub async fn live<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(policy): Extension<DisplayPolicy>,
    current_user: CurrentUser<S>,
    QueryParameters(query): QueryParameters<NotesQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, Error> {
    let mut board = NoteBoard::new(query.into_parameters()?, policy);

    tracing::debug!(
        "Following notes of {} with {:?}",
        current_user.username,
        board.parameters()
    );

    let snapshots = storage
        .subscribe_notes(&current_user.id)
        .into_stream()
        .map(move |notes| {
            board.apply_snapshot(notes);
            NoteResponse::from_note_multiple(board.visible())
        });

    Ok(snapshot_events("notes", snapshots))
}

pub async fn single<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(note_id): PathParameters<Uuid>,
) -> Result<Success<NoteResponse>, Error> {
    fetch_note(&storage, &current_user.id, &note_id)
        .await
        .map(|note| Success::ok(NoteResponse::from_note(note)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteForm {
    folder_id: Option<Uuid>,
    title: Option<String>,
    text: Option<String>,
    color: Option<String>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    is_pinned: Option<bool>,
    is_archived: Option<bool>,
}

/// Create a note, every field is optional
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "title": "Groceries", "text": "<p>Milk</p>", "category": "Personal" }' \
///     http://localhost:6000/api/notes
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateNoteForm>,
) -> Result<Success<NoteResponse>, Error> {
    if let Some(folder_id) = &form.folder_id {
        fetch_folder(&storage, &current_user.id, folder_id).await?;
    }

    let fields = NoteDraft {
        folder_id: form.folder_id,
        title: form.title,
        text: form.text,
        color: form.color,
        category: form.category,
        tags: form.tags,
        is_pinned: form.is_pinned,
        is_archived: form.is_archived,
    }
    .resolve();

    let note = storage
        .create_note(&current_user, &fields)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!("Note {} created by {}", note.id, current_user.username);

    Ok(Success::created(NoteResponse::from_note(note)))
}

/// Tell a missing field apart from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Update form, `null` clears the folder or the category
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteForm {
    #[serde(default, deserialize_with = "double_option")]
    folder_id: Option<Option<Uuid>>,
    title: Option<String>,
    text: Option<String>,
    color: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    category: Option<Option<String>>,
    tags: Option<Vec<String>>,
    is_pinned: Option<bool>,
    is_archived: Option<bool>,
}

pub async fn update<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(note_id): PathParameters<Uuid>,
    Form(form): Form<UpdateNoteForm>,
) -> Result<Success<NoteResponse>, Error> {
    let note = fetch_note(&storage, &current_user.id, &note_id).await?;

    if let Some(Some(folder_id)) = &form.folder_id {
        fetch_folder(&storage, &current_user.id, folder_id).await?;
    }

    let changes = NotePatch {
        folder_id: form.folder_id,
        title: form.title,
        text: form.text,
        color: form.color,
        category: form.category,
        tags: form.tags,
        is_pinned: form.is_pinned,
        is_archived: form.is_archived,
    }
    .resolve();

    save_changes(&storage, &note, &changes).await
}

pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(note_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let note = fetch_note(&storage, &current_user.id, &note_id).await?;

    storage
        .delete_note(&note)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}

/// Flip the pinned flag
pub async fn toggle_pin<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(note_id): PathParameters<Uuid>,
) -> Result<Success<NoteResponse>, Error> {
    let note = fetch_note(&storage, &current_user.id, &note_id).await?;

    let changes = NoteChanges {
        is_pinned: Some(!note.is_pinned),
        ..NoteChanges::default()
    };

    save_changes(&storage, &note, &changes).await
}

/// Flip the archived flag
pub async fn toggle_archive<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(note_id): PathParameters<Uuid>,
) -> Result<Success<NoteResponse>, Error> {
    let note = fetch_note(&storage, &current_user.id, &note_id).await?;

    let changes = NoteChanges {
        is_archived: Some(!note.is_archived),
        ..NoteChanges::default()
    };

    save_changes(&storage, &note, &changes).await
}

async fn save_changes<S: Storage>(
    storage: &S,
    note: &Note,
    changes: &NoteChanges,
) -> Result<Success<NoteResponse>, Error> {
    storage
        .update_note(note, changes)
        .await
        .map(|note| Success::ok(NoteResponse::from_note(note)))
        .map_err(|err| Error::from_storage(err, "Note"))
}
