use serde::{Deserialize, Serialize};

use crate::constants::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN};

/// User row, including the password hash. Never serialized to clients.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

/// User model for API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            avatar: record.avatar,
            created_at: record.created_at,
        }
    }
}

impl User {
    /// Usernames: at least three characters, no surrounding whitespace
    pub fn validate_username(username: &str) -> bool {
        username.trim() == username && username.chars().count() >= MIN_USERNAME_LEN
    }

    /// Minimal email shape check: `local@domain` with a dot in the domain
    pub fn validate_email(email: &str) -> bool {
        match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        }
    }

    pub fn validate_password(password: &str) -> bool {
        password.chars().count() >= MIN_PASSWORD_LEN
    }
}
