#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use anyhow::Result;
use axum::Extension;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::JwtKeys;
use crate::api::router;
use crate::config::Config;
use crate::query::DisplayPolicy;
use crate::storage::Backend;
use crate::storage::Storage;

mod api;
mod board;
mod categories;
mod config;
mod folders;
mod graceful_shutdown;
mod markup;
mod notes;
mod password;
mod query;
mod storage;
#[cfg(test)]
mod tests;
mod todos;
mod users;
mod utils;

const DEFAULT_RUST_LOG: &str = "notely=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = Config::from_env()?;
    let app = setup_app(&config).await?;

    let listener = TcpListener::bind(config.address).await?;
    tracing::info!("Listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    Ok(())
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if the storage fails to load:
/// - Local file can not be read
/// - Database connection or migrations
pub async fn setup_app(config: &Config) -> Result<Router> {
    let backend = storage::setup(config.storage.clone()).await?;
    let jwt_keys = JwtKeys::new(config.jwt_secret.as_bytes());

    let router = match backend {
        Backend::Local(storage) => {
            tracing::info!("Using local storage");
            create_router(storage, jwt_keys, config.display_policy)
        }
        Backend::Postgres(storage) => {
            tracing::info!("Using Postgres storage");
            create_router(storage, jwt_keys, config.display_policy)
        }
    };

    Ok(router)
}

/// Create the router for Notely
fn create_router<S: Storage>(storage: S, jwt_keys: JwtKeys, policy: DisplayPolicy) -> Router {
    Router::new()
        .nest("/api", router::<S>())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(jwt_keys))
        .layer(Extension(policy))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}
