use axum::Extension;
use axum::response::Sse;
use axum::response::sse::Event;
use chrono::NaiveDateTime;
use futures::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::folders::Folder;
use crate::folders::parse_name;
use crate::storage::CreateFolderValues;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::live::snapshot_events;
use super::utils::fetch_folder;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FolderResponse {
    fn from_folder(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            created_at: folder.created_at,
            updated_at: folder.updated_at,
        }
    }

    fn from_folder_multiple(folders: Vec<Folder>) -> Vec<Self> {
        folders.into_iter().map(Self::from_folder).collect()
    }
}

/// Form to create or rename a folder
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderForm {
    name: String,
}

impl FolderForm {
    fn name(&self) -> Result<String, Error> {
        parse_name(&self.name).ok_or_else(|| {
            Error::bad_request("Invalid folder").with_description("The name can not be empty")
        })
    }
}

pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<FolderResponse>>, Error> {
    let folders = storage
        .find_all_folders(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::ok(FolderResponse::from_folder_multiple(folders)))
}

/// Follow the folders, an event with the full list is sent on every change
pub async fn live<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let snapshots = storage
        .subscribe_folders(&current_user.id)
        .into_stream()
        .map(FolderResponse::from_folder_multiple);

    snapshot_events("folders", snapshots)
}

pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<FolderForm>,
) -> Result<Success<FolderResponse>, Error> {
    let name = form.name()?;

    let values = CreateFolderValues {
        user: &current_user,
        name: &name,
    };

    let folder = storage
        .create_folder(&values)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::created(FolderResponse::from_folder(folder)))
}

pub async fn rename<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(folder_id): PathParameters<Uuid>,
    Form(form): Form<FolderForm>,
) -> Result<Success<FolderResponse>, Error> {
    let folder = fetch_folder(&storage, &current_user.id, &folder_id).await?;
    let name = form.name()?;

    storage
        .rename_folder(&folder, &name)
        .await
        .map(|folder| Success::ok(FolderResponse::from_folder(folder)))
        .map_err(|err| Error::from_storage(err, "Folder"))
}

/// Delete a folder, its notes are kept outside of any folder
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(folder_id): PathParameters<Uuid>,
) -> Result<Success<&'static str>, Error> {
    let folder = fetch_folder(&storage, &current_user.id, &folder_id).await?;

    storage
        .delete_folder(&folder)
        .await
        .map_err(Error::internal_server_error)?;

    Ok(Success::<&'static str>::no_content())
}
