use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::db;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::session::{JoinSession, NewSession, SessionSummary};
use crate::models::SessionDetail;
use crate::routes::validation::{parse_id, AppJson};
use crate::AppState;

/// Public sessions plus any the caller created or joined
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<SessionSummary>>> {
    Ok(Json(db::sessions::list_sessions(&state.pool, user.id()).await?))
}

pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<NewSession>,
) -> Result<(StatusCode, Json<SessionDetail>)> {
    input.validate()?;
    let detail = db::sessions::create_session(&state.pool, user.id(), &input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_session(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<SessionDetail>> {
    let id = parse_id(&raw_id, "Session")?;
    db::sessions::get_session(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Session"))
}

/// Join as a player; the body is optional and may pick a color
pub async fn join_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(raw_id): Path<String>,
    body: Option<AppJson<JoinSession>>,
) -> Result<Json<SessionDetail>> {
    let id = parse_id(&raw_id, "Session")?;
    let color = body.and_then(|AppJson(b)| b.color);
    let detail =
        db::sessions::join_session(&state.pool, id, user.id(), color.as_deref()).await?;

    state.relay.emit_to_session(
        id,
        "player-joined",
        json!({ "userId": user.id(), "username": user.0.username }),
    );
    Ok(Json(detail))
}

pub async fn delete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&raw_id, "Session")?;
    db::sessions::delete_session(&state.pool, id, user.id()).await?;
    Ok(Json(json!({ "message": "Session deleted" })))
}
