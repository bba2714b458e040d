//! Character access guards.
//!
//! Handlers for `/api/characters/:id/...` take one of these extractors
//! instead of the raw path id, so the existence and ownership checks run
//! before any handler code.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use std::collections::HashMap;

use crate::db::characters::access_info;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;

async fn character_id_from_path(parts: &mut Parts, state: &AppState) -> Result<i64, AppError> {
    let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
        .await
        .map_err(|_| AppError::InvalidInput("Missing character id".to_string()))?;

    params
        .get("id")
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| AppError::InvalidInput("Character id must be an integer".to_string()))
}

/// Character the caller owns; 404 if it does not exist, 403 otherwise
#[derive(Debug, Clone)]
pub struct OwnedCharacter {
    pub user: AuthUser,
    pub id: i64,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OwnedCharacter {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let id = character_id_from_path(parts, state).await?;

        let info = access_info(&state.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("Character"))?;

        if info.user_id != user.id() {
            tracing::warn!("User {} denied write access to character {}", user.id(), id);
            return Err(AppError::Forbidden);
        }

        Ok(OwnedCharacter { user, id })
    }
}

/// Character the caller may read: their own, or any public one
#[derive(Debug, Clone)]
pub struct VisibleCharacter {
    pub user: AuthUser,
    pub id: i64,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for VisibleCharacter {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let id = character_id_from_path(parts, state).await?;

        let info = access_info(&state.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("Character"))?;

        if info.user_id != user.id() && !info.is_public {
            tracing::warn!("User {} denied read access to character {}", user.id(), id);
            return Err(AppError::Forbidden);
        }

        Ok(VisibleCharacter { user, id })
    }
}
