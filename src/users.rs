use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Shortest password accepted on sign up and password change
pub const MINIMUM_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub session_id: Uuid,
    pub username: String,
    pub hashed_password: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Trim and validate a username
pub fn parse_username(username: &str) -> Option<String> {
    let username = username.trim();

    if username.is_empty() || username.chars().any(char::is_whitespace) {
        None
    } else {
        Some(username.to_string())
    }
}
