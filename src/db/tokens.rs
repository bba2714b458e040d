use sqlx::SqlitePool;

use crate::constants::DEFAULT_TOKEN_SIZE;
use crate::error::{AppError, Result};
use crate::models::token::{NewToken, Token, TokenPatch};

const TOKEN_COLUMNS: &str = "id, session_id, name, image_url, x, y, width, height, rotation, \
                             is_visible, is_locked, owner_id, created_at, updated_at";

pub async fn list_tokens(pool: &SqlitePool, session_id: i64) -> Result<Vec<Token>> {
    let tokens = sqlx::query_as::<_, Token>(&format!(
        "SELECT {} FROM tokens WHERE session_id = ? ORDER BY id",
        TOKEN_COLUMNS
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(tokens)
}

pub async fn create_token(
    pool: &SqlitePool,
    session_id: i64,
    owner_id: i64,
    input: &NewToken,
) -> Result<Token> {
    input.validate()?;
    let token = sqlx::query_as::<_, Token>(&format!(
        "INSERT INTO tokens (session_id, name, image_url, x, y, width, height, owner_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {}",
        TOKEN_COLUMNS
    ))
    .bind(session_id)
    .bind(input.name.trim())
    .bind(input.image_url.trim())
    .bind(input.x.unwrap_or(0))
    .bind(input.y.unwrap_or(0))
    .bind(input.width.unwrap_or(DEFAULT_TOKEN_SIZE))
    .bind(input.height.unwrap_or(DEFAULT_TOKEN_SIZE))
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    tracing::info!("Created token {} in session {}", token.id, session_id);
    Ok(token)
}

/// Partially update a token of the given session
pub async fn update_token(
    pool: &SqlitePool,
    session_id: i64,
    token_id: i64,
    patch: &TokenPatch,
) -> Result<Token> {
    patch.validate()?;
    let token = sqlx::query_as::<_, Token>(&format!(
        "UPDATE tokens SET
            name = COALESCE(?, name),
            image_url = COALESCE(?, image_url),
            x = COALESCE(?, x),
            y = COALESCE(?, y),
            width = COALESCE(?, width),
            height = COALESCE(?, height),
            rotation = COALESCE(?, rotation),
            is_visible = COALESCE(?, is_visible),
            is_locked = COALESCE(?, is_locked),
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ? AND session_id = ?
         RETURNING {}",
        TOKEN_COLUMNS
    ))
    .bind(patch.name.as_deref().map(str::trim))
    .bind(&patch.image_url)
    .bind(patch.x)
    .bind(patch.y)
    .bind(patch.width)
    .bind(patch.height)
    .bind(patch.rotation)
    .bind(patch.is_visible)
    .bind(patch.is_locked)
    .bind(token_id)
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Token"))?;
    Ok(token)
}

pub async fn delete_token(pool: &SqlitePool, session_id: i64, token_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM tokens WHERE id = ? AND session_id = ?")
        .bind(token_id)
        .bind(session_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Token"));
    }
    tracing::info!("Deleted token {} from session {}", token_id, session_id);
    Ok(())
}
