use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{ERR_BAD_CREDENTIALS, ERR_DUPLICATE_USER};
use crate::db;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::routes::validation::{validate_credentials, AppJson};
use crate::security::{hash_password_blocking, issue_token, verify_password_blocking};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn token_for(state: &AppState, user: &User) -> Result<String> {
    issue_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        Utc::now().timestamp(),
        state.config.jwt_ttl_secs,
    )
}

/// Register a new account and sign it in
///
/// Returns 409 if the username or email is already taken.
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();
    validate_credentials(Some(&username), Some(&email), Some(&payload.password))?;

    if db::users::is_taken(&state.pool, Some(&username), Some(&email), None).await? {
        tracing::info!("Registration rejected: duplicate user");
        return Err(AppError::Conflict(ERR_DUPLICATE_USER.to_string()));
    }

    let hash = hash_password_blocking(payload.password).await?;
    let user = db::users::create_user(&state.pool, &username, &email, &hash).await?;
    let token = token_for(&state, &user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Email and password are required".to_string(),
        ));
    }

    let Some(record) = db::users::find_record_by_email(&state.pool, &payload.email).await? else {
        tracing::warn!("Login failed: unknown email");
        return Err(AppError::Unauthorized(ERR_BAD_CREDENTIALS.to_string()));
    };

    if !verify_password_blocking(payload.password, record.password_hash.clone()).await? {
        tracing::warn!("Login failed for user {}", record.id);
        return Err(AppError::Unauthorized(ERR_BAD_CREDENTIALS.to_string()));
    }

    let user = User::from(record);
    let token = token_for(&state, &user)?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn list_users(State(state): State<AppState>, _user: AuthUser) -> Result<Json<Vec<User>>> {
    Ok(Json(db::users::list_users(&state.pool).await?))
}
