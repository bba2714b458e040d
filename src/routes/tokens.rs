use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::db;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::token::{NewToken, TokenPatch};
use crate::models::Token;
use crate::routes::validation::{parse_id, AppJson};
use crate::AppState;

async fn existing_session(state: &AppState, raw_id: &str) -> Result<i64> {
    let id = parse_id(raw_id, "Session")?;
    db::sessions::find_session(&state.pool, id)
        .await?
        .map(|s| s.id)
        .ok_or_else(|| AppError::not_found("Session"))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize token event payload: {}", e);
        Value::Null
    })
}

pub async fn list_tokens(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(raw_session): Path<String>,
) -> Result<Json<Vec<Token>>> {
    let session_id = existing_session(&state, &raw_session).await?;
    Ok(Json(db::tokens::list_tokens(&state.pool, session_id).await?))
}

/// Place a token and tell everyone in the session room
pub async fn create_token(
    State(state): State<AppState>,
    user: AuthUser,
    Path(raw_session): Path<String>,
    AppJson(input): AppJson<NewToken>,
) -> Result<(StatusCode, Json<Token>)> {
    let session_id = existing_session(&state, &raw_session).await?;
    let token = db::tokens::create_token(&state.pool, session_id, user.id(), &input).await?;
    state
        .relay
        .emit_to_session(session_id, "token-created", to_value(&token));
    Ok((StatusCode::CREATED, Json(token)))
}

pub async fn update_token(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((raw_session, raw_token)): Path<(String, String)>,
    AppJson(patch): AppJson<TokenPatch>,
) -> Result<Json<Token>> {
    let session_id = existing_session(&state, &raw_session).await?;
    let token_id = parse_id(&raw_token, "Token")?;
    let token = db::tokens::update_token(&state.pool, session_id, token_id, &patch).await?;
    state
        .relay
        .emit_to_session(session_id, "token-updated", to_value(&token));
    Ok(Json(token))
}

pub async fn delete_token(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((raw_session, raw_token)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let session_id = existing_session(&state, &raw_session).await?;
    let token_id = parse_id(&raw_token, "Token")?;
    db::tokens::delete_token(&state.pool, session_id, token_id).await?;
    state
        .relay
        .emit_to_session(session_id, "token-deleted", json!(token_id));
    Ok(Json(json!({ "message": "Token deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_to_value_falls_back_to_null() {
        let token = json!({"id": 1, "name": "Goblin"});
        assert_eq!(to_value(&token), token);

        let tuple_keys: BTreeMap<(i32, i32), i32> = [((1, 2), 3)].into_iter().collect();
        assert_eq!(to_value(&tuple_keys), Value::Null);
    }
}
