//! User API management

use axum::Extension;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::password::hash;
use crate::password::verify;
use crate::storage::ChangePasswordValues;
use crate::storage::CreateUserValues;
use crate::storage::Storage;
use crate::users::MINIMUM_PASSWORD_LENGTH;
use crate::users::User;
use crate::users::parse_username;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::JwtKeys;
use super::Success;
use super::current_user::Token;
use super::current_user::generate_token;

/// The user response information
///
/// A subset of all the information, ready to be serialized for the outside world
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// The user ID
    pub id: Uuid,

    /// The username
    pub username: String,

    /// Moment of sign up
    pub created_at: NaiveDateTime,
}

impl UserResponse {
    /// Create a user response from a [`User`](User)
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            created_at: user.created_at,
        }
    }
}

/// Check the password rules
fn check_password(password: &str) -> Result<(), Error> {
    if password.chars().count() < MINIMUM_PASSWORD_LENGTH {
        return Err(Error::bad_request("Password is too short").with_description(format!(
            "Use at least {MINIMUM_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Sign up form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    /// Username of the new user
    username: String,
    /// Password of the new user
    password: String,
}

/// Sign up a new user based on the [`SignUpForm`](SignUpForm) form
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "username": "ada", "password": "verysecret" }' \
///     http://localhost:6000/api/users
/// ```
///
/// Response
/// ```json
/// { "data": { "id": "<uuid>", "username": "ada", "createdAt": "..." } }
/// ```
pub async fn sign_up<S: Storage>(
    Extension(storage): Extension<S>,
    Form(form): Form<SignUpForm>,
) -> Result<Success<UserResponse>, Error> {
    let Some(username) = parse_username(&form.username) else {
        return Err(Error::bad_request("Invalid username")
            .with_description("A username is required and can not contain whitespace"));
    };

    check_password(&form.password)?;

    let existing = storage
        .find_single_user_by_username(&username)
        .await
        .map_err(Error::internal_server_error)?;

    if existing.is_some() {
        return Err(Error::bad_request("User already exists"));
    }

    let hashed_password = hash(&form.password).map_err(Error::internal_server_error)?;

    let values = CreateUserValues {
        session_id: &Uuid::new_v4(),
        username: &username,
        hashed_password: &hashed_password,
    };

    // a concurrent sign up may have taken the name since the lookup
    let user = storage
        .create_user(&values)
        .await
        .map_err(|err| Error::from_storage(err, "User"))?;

    tracing::info!("New user signed up: {}", user.username);

    Ok(Success::created(UserResponse::from_user(&user)))
}

/// Login form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    /// Username of the user
    username: String,
    /// Password of the user
    password: String,
}

/// Get a token for a user "session"
///
/// The token can then be used to access the rest of the API routes by using it in the
/// `Authorization` header
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "username": "ada", "password": "verysecret" }' \
///     http://localhost:6000/api/users/token
/// ```
///
/// Response
/// ```json
/// { "data": { "token_type": "Bearer", "access_token": "some token", "expires_in": 3600 } }
/// ```
pub async fn token<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<LoginForm>,
) -> Result<Success<Token>, Error> {
    let user = storage
        .find_single_user_by_username(&form.username)
        .await
        .map_err(Error::internal_server_error)?;

    match user {
        Some(user) if verify(&user.hashed_password, &form.password) => {
            generate_token(&jwt_keys, &user).map(Success::ok)
        }
        _ => Err(Error::bad_request("Invalid user")),
    }
}

/// Get the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:6000/api/users/me
/// ```
pub async fn me<S: Storage>(current_user: CurrentUser<S>) -> Success<UserResponse> {
    Success::ok(UserResponse::from_user(&current_user))
}

/// Change password form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordForm {
    /// Current password for verification
    current_password: String,
    /// New password
    password: String,
}

/// Change the password of the current user
///
/// Changing your password will invalidate your current access token, a fresh one is returned
///
/// Request:
/// ```sh
/// curl -v -XPUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "currentPassword": "verysecret", "password": "veryverysecret" }' \
///     http://localhost:6000/api/users/me/password
/// ```
///
/// Response
/// ```json
/// { "data": { "token_type": "Bearer", "access_token": "some token", "expires_in": 3600 } }
/// ```
pub async fn change_password<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Success<Token>, Error> {
    if !verify(&current_user.hashed_password, &form.current_password) {
        return Err(Error::bad_request("Invalid password"));
    }

    check_password(&form.password)?;

    let hashed_password = hash(&form.password).map_err(Error::internal_server_error)?;

    let values = ChangePasswordValues {
        session_id: &Uuid::new_v4(),
        hashed_password: &hashed_password,
    };

    let updated_user = storage
        .change_password(&current_user, &values)
        .await
        .map_err(Error::internal_server_error)?;

    tracing::info!("Password changed for {}", updated_user.username);

    let token = generate_token(&jwt_keys, &updated_user)?;

    Ok(Success::ok(token))
}
