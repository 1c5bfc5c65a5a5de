//! All API endpoint setup

use axum::Router;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use axum::routing::put;

use crate::storage::Storage;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use request::Form;
pub use request::PathParameters;
pub use request::QueryParameters;
pub use response::Error;
pub use response::Success;

mod categories;
mod current_user;
mod folders;
mod live;
mod notes;
mod request;
mod response;
mod todos;
mod users;
mod utils;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let users = Router::new()
        .route("/", post(users::sign_up::<S>))
        .route("/token", post(users::token::<S>))
        .route("/me", get(users::me::<S>))
        .route("/me/password", put(users::change_password::<S>));

    let notes = Router::new()
        .route("/", get(notes::list::<S>).post(notes::create::<S>))
        .route("/live", get(notes::live::<S>))
        .route(
            "/{note}",
            get(notes::single::<S>)
                .patch(notes::update::<S>)
                .delete(notes::delete::<S>),
        )
        .route("/{note}/pin", post(notes::toggle_pin::<S>))
        .route("/{note}/archive", post(notes::toggle_archive::<S>));

    let categories = Router::new()
        .route("/", get(categories::list::<S>).post(categories::create::<S>))
        .route("/{name}", delete(categories::delete::<S>));

    let todos = Router::new()
        .route("/", get(todos::list::<S>).post(todos::create::<S>))
        .route("/live", get(todos::live::<S>))
        .route(
            "/{todo}",
            patch(todos::update::<S>).delete(todos::delete::<S>),
        )
        .route("/{todo}/toggle", post(todos::toggle::<S>));

    let folders = Router::new()
        .route("/", get(folders::list::<S>).post(folders::create::<S>))
        .route("/live", get(folders::live::<S>))
        .route(
            "/{folder}",
            patch(folders::rename::<S>).delete(folders::delete::<S>),
        );

    Router::new()
        .nest("/users", users)
        .nest("/notes", notes)
        .nest("/categories", categories)
        .nest("/todos", todos)
        .nest("/folders", folders)
}
