use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::Utc;

use crate::constants::{ERR_MISSING_TOKEN, ERR_UNKNOWN_USER};
use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::security::{bearer_token, verify_token};
use crate::AppState;

/// The caller, resolved from `Authorization: Bearer <token>`
///
/// Rejects with 401 when the header is missing, the token does not verify,
/// or the user it names no longer exists.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

/// Verify a raw token and load the user it belongs to
pub async fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    let claims = verify_token(token, &state.config.jwt_secret, Utc::now().timestamp())?;

    db::users::find_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Token presented for deleted user {}", claims.sub);
            AppError::Unauthorized(ERR_UNKNOWN_USER.to_string())
        })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized(ERR_MISSING_TOKEN.to_string()))?;

        let user = authenticate(state, token).await.map_err(|e| {
            tracing::warn!("Rejected bearer token: {}", e);
            e
        })?;

        Ok(AuthUser(user))
    }
}
