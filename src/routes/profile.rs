use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::constants::ERR_DUPLICATE_USER;
use crate::db::{self, users::ProfileChanges};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::routes::validation::{validate_credentials, AppJson};
use crate::security::hash_password_blocking;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn get_profile(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

/// Update the caller's profile; omitted or blank fields keep their value
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let username = non_empty(payload.username);
    let email = non_empty(payload.email);
    let password = payload.password.filter(|p| !p.is_empty());
    validate_credentials(username.as_deref(), email.as_deref(), password.as_deref())?;

    if (username.is_some() || email.is_some())
        && db::users::is_taken(&state.pool, username.as_deref(), email.as_deref(), Some(user.id))
            .await?
    {
        return Err(AppError::Conflict(ERR_DUPLICATE_USER.to_string()));
    }

    let password_hash = match password {
        Some(p) => Some(hash_password_blocking(p).await?),
        None => None,
    };

    let updated = db::users::update_profile(
        &state.pool,
        user.id,
        ProfileChanges {
            username,
            email,
            password_hash,
            avatar: non_empty(payload.avatar),
        },
    )
    .await?;

    tracing::info!("User {} updated their profile", user.id);
    Ok(Json(ProfileResponse {
        message: "Profile updated".to_string(),
        user: updated,
    }))
}
