use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::db;
use crate::AppState;

/// Health check endpoint
///
/// Reports user and session counts. A database failure degrades the status
/// instead of failing the request.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let counts = async {
        let users = db::users::count_users(&state.pool).await?;
        let sessions = db::sessions::count_sessions(&state.pool).await?;
        Ok::<_, crate::error::AppError>((users, sessions))
    }
    .await;

    let timestamp = Utc::now().to_rfc3339();

    match counts {
        Ok((users, sessions)) => Json(json!({
            "status": "ok",
            "database": "connected",
            "users": users,
            "sessions": sessions,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": timestamp,
        })),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            Json(json!({
                "status": "degraded",
                "database": "error",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": timestamp,
            }))
        }
    }
}
