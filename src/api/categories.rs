//! Category API management
//!
//! Predefined categories are listed for everybody and can not be created or deleted

use axum::Extension;
use serde::Deserialize;
use serde::Serialize;

use crate::categories::available_names;
use crate::categories::is_predefined;
use crate::categories::parse_name;
use crate::storage::CreateCategoryValues;
use crate::storage::Storage;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::utils::fetch_category;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub name: String,
    pub is_predefined: bool,
}

impl CategoryResponse {
    fn from_name(name: String) -> Self {
        Self {
            is_predefined: is_predefined(&name),
            name,
        }
    }
}

/// Result of deleting a category
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCategoryResponse {
    pub name: String,

    /// Notes moved to `Uncategorized`
    pub reassigned_notes: usize,
}

/// List the predefined categories followed by the categories of the user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/categories
/// ```
pub async fn list<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<CategoryResponse>>, Error> {
    let categories = storage
        .find_all_categories(&current_user.id)
        .await
        .map_err(Error::internal_server_error)?;

    let categories = available_names(&categories)
        .into_iter()
        .map(CategoryResponse::from_name)
        .collect();

    Ok(Success::ok(categories))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryForm {
    name: String,
}

/// Create a category
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "name": "Travel" }' \
///     http://localhost:6000/api/categories
/// ```
pub async fn create<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateCategoryForm>,
) -> Result<Success<CategoryResponse>, Error> {
    let name = parse_name(&form.name).map_err(Error::bad_request)?;

    let existing = storage
        .find_single_category_by_name(&current_user.id, &name)
        .await
        .map_err(Error::internal_server_error)?;

    if existing.is_some() {
        return Err(Error::bad_request("Category already exists"));
    }

    let values = CreateCategoryValues {
        user: &current_user,
        name: &name,
    };

    let category = storage
        .create_category(&values)
        .await
        .map_err(|err| Error::from_storage(err, "Category"))?;

    Ok(Success::created(CategoryResponse::from_name(category.name)))
}

/// Delete a category, its notes are moved to `Uncategorized`
///
/// Request:
/// ```sh
/// curl -v -XDELETE \
///     -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/categories/Travel
/// ```
pub async fn delete<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    PathParameters(name): PathParameters<String>,
) -> Result<Success<DeletedCategoryResponse>, Error> {
    if is_predefined(&name) {
        return Err(Error::bad_request("Category is predefined")
            .with_description("Predefined categories can not be deleted"));
    }

    let category = fetch_category(&storage, &current_user.id, &name).await?;

    let reassigned_notes = storage
        .delete_category(&category)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::debug!(
        "Category {} deleted by {}, {reassigned_notes} notes reassigned",
        category.name,
        current_user.username
    );

    Ok(Success::ok(DeletedCategoryResponse {
        name: category.name,
        reassigned_notes,
    }))
}
