use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::{MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use crate::error::AppError;
use crate::models::User;

/// Check whichever account fields are present
pub fn validate_credentials(
    username: Option<&str>,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<(), AppError> {
    if let Some(username) = username {
        if !User::validate_username(username) {
            return Err(AppError::InvalidInput(format!(
                "Username must be at least {} characters",
                MIN_USERNAME_LEN
            )));
        }
    }
    if let Some(email) = email {
        if !User::validate_email(email) {
            return Err(AppError::InvalidInput("Invalid email address".to_string()));
        }
    }
    if let Some(password) = password {
        if !User::validate_password(password) {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
    }
    Ok(())
}

/// Parse a path id, rejecting anything that is not an integer with 400
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::InvalidInput(format!("{} id must be an integer", what)))
}

/// `Json<T>` whose rejections come back as 400 with the usual error body
#[derive(Debug)]
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::warn!("Rejected request body: {}", rejection.body_text());
            AppError::InvalidInput(format!("Invalid request body: {}", rejection.body_text()))
        })?;
        Ok(AppJson(value))
    }
}

/// Require the listed fields to be present and non-null in a definition
pub fn require_fields(data: &Value, fields: &[&str]) -> Result<(), AppError> {
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| data.get(*f).map_or(true, Value::is_null))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}
