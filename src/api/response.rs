//! API response helpers
//!
//! Successful responses are wrapped as `{ "data": ... }`, failures as
//! `{ "error": "...", "description": "..." }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use crate::storage;

/// Hold data for a successful API interaction
pub struct Success<V>
where
    V: Serialize,
{
    status_code: StatusCode,
    data: Option<V>,
}

impl<V> Success<V>
where
    V: Serialize,
{
    pub fn ok(data: V) -> Self {
        Self {
            status_code: StatusCode::OK,
            data: Some(data),
        }
    }

    pub fn created(data: V) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            data: Some(data),
        }
    }

    /// Nothing to return, used after deletes
    pub fn no_content() -> Self {
        Self {
            status_code: StatusCode::NO_CONTENT,
            data: None,
        }
    }
}

#[derive(Serialize)]
struct DataWrapper<D>
where
    D: Serialize,
{
    data: D,
}

impl<V> IntoResponse for Success<V>
where
    V: Serialize,
{
    fn into_response(self) -> Response {
        match self.data {
            Some(data) => (self.status_code, Json(DataWrapper { data })).into_response(),
            None => self.status_code.into_response(),
        }
    }
}

/// Hold data for a failed API interaction
#[derive(Debug)]
pub struct Error {
    status_code: StatusCode,
    message: String,
    description: Option<String>,
}

impl Error {
    fn new<M>(status_code: StatusCode, message: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code,
            message: message.to_string(),
            description: None,
        }
    }

    pub fn bad_request<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Missing or rejected credentials
    pub fn forbidden<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Also used for records of other users
    pub fn not_found<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Something broke on our side, the cause is logged and not shared
    pub fn internal_server_error<M>(message: M) -> Self
    where
        M: ToString,
    {
        tracing::error!("Internal server error: {}", message.to_string());

        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    /// Map a storage failure on a single record, `record` names it in the message
    ///
    /// A record that vanished in the meantime is `404`, a taken name is `400`
    pub fn from_storage(err: storage::Error, record: &str) -> Self {
        match err {
            storage::Error::NotFound => Self::not_found(format!("{record} not found")),
            storage::Error::Duplicate => Self::bad_request(format!("{record} already exists")),
            err => Self::internal_server_error(err),
        }
    }

    pub fn with_description<M>(&self, description: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code: self.status_code,
            message: self.message.clone(),
            description: Some(description.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorWrapper {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorWrapper {
            error: self.message,
            description: self.description,
        };

        (self.status_code, Json(body)).into_response()
    }
}
