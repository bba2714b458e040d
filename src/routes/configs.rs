use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::constants::MAX_HIT_DIE;
use crate::content_store::document_name;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::routes::validation::{require_fields, AppJson};
use crate::AppState;

/// A document that accepts new definitions over HTTP
struct DefinitionKind {
    document: &'static str,
    singular: &'static str,
    required: &'static [&'static str],
}

const RACE: DefinitionKind = DefinitionKind {
    document: "races",
    singular: "race",
    required: &["name", "ability_bonuses"],
};

const CLASS: DefinitionKind = DefinitionKind {
    document: "classes",
    singular: "class",
    required: &["name", "hit_die", "primary_ability"],
};

const SPELL: DefinitionKind = DefinitionKind {
    document: "spells",
    singular: "spell",
    required: &["name", "level"],
};

const ITEM: DefinitionKind = DefinitionKind {
    document: "items",
    singular: "item",
    required: &["name", "type"],
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub key: String,
    pub data: Option<Value>,
}

pub async fn get_all_configs(State(state): State<AppState>) -> Result<Json<Value>> {
    let configs = state.content.all().await?;
    Ok(Json(json!({
        "message": "All configs loaded",
        "configs": configs,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let name = document_name(&name)?;
    let config = state.content.read(name).await?;
    if config.is_empty() {
        return Err(AppError::NotFound(format!("Config '{}'", name)));
    }
    Ok(Json(json!({
        "message": format!("Config {} loaded", name),
        "count": config.len(),
        "config": config,
    })))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = state.content.stats().await?;
    Ok(Json(json!({
        "message": "Config statistics",
        "stats": stats,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

pub async fn search_configs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>> {
    let results = state.content.search(&query.q).await?;
    Ok(Json(json!({
        "query": query.q.trim(),
        "count": results.len(),
        "results": results,
    })))
}

/// Class definitions carrying a `hit_die` must keep it in `1..=20`
fn check_class_hit_die(document: &str, data: &Value) -> Result<()> {
    if document != CLASS.document {
        return Ok(());
    }
    match data.get("hit_die") {
        None => Ok(()),
        Some(die) if die.as_i64().is_some_and(|d| (1..=MAX_HIT_DIE).contains(&d)) => Ok(()),
        Some(_) => Err(AppError::InvalidInput(format!(
            "hit_die must be a whole number from 1 to {}",
            MAX_HIT_DIE
        ))),
    }
}

/// Body is `{<kind>Key, <kind>Data}`, e.g. `{raceKey, raceData}`
async fn add_definition(
    state: &AppState,
    user: &AuthUser,
    kind: &DefinitionKind,
    body: Value,
) -> Result<(StatusCode, Json<Value>)> {
    let key_field = format!("{}Key", kind.singular);
    let data_field = format!("{}Data", kind.singular);

    let key = body
        .get(&key_field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty());
    let data = body.get(&data_field).filter(|d| d.is_object());
    let (Some(key), Some(data)) = (key, data) else {
        return Err(AppError::InvalidInput(format!(
            "{} and {} are required",
            key_field, data_field
        )));
    };
    require_fields(data, kind.required)?;
    check_class_hit_die(kind.document, data)?;

    state.content.add(kind.document, key, data.clone()).await?;
    tracing::info!("User {} added {} '{}'", user.id(), kind.singular, key);

    let mut response = json!({
        "message": format!("{} added", kind.singular),
        "key": key,
    });
    response[kind.singular] = data.clone();
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/configs/:name` for the documents that accept new definitions
pub async fn add_config_entry(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    AppJson(body): AppJson<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let name = document_name(&name)?;
    let kind = [RACE, CLASS, SPELL, ITEM]
        .into_iter()
        .find(|k| k.document == name)
        .ok_or_else(|| {
            AppError::InvalidInput(format!("Definitions cannot be added to {}", name))
        })?;
    add_definition(&state, &user, &kind, body).await
}

/// Shallow-merge `data` into an existing definition
pub async fn update_config(
    State(state): State<AppState>,
    user: AuthUser,
    Path(name): Path<String>,
    AppJson(body): AppJson<ConfigUpdate>,
) -> Result<Json<Value>> {
    let name = document_name(&name)?;
    let key = body.key.trim();
    let Some(data) = body.data.filter(|_| !key.is_empty()) else {
        return Err(AppError::InvalidInput("key and data are required".to_string()));
    };
    check_class_hit_die(name, &data)?;

    let merged = state.content.update(name, key, data).await?;
    tracing::info!("User {} updated '{}' in {}", user.id(), key, name);

    Ok(Json(json!({
        "message": "Config updated",
        "key": key,
        "data": merged,
    })))
}

pub async fn remove_config_entry(
    State(state): State<AppState>,
    user: AuthUser,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let name = document_name(&name)?;
    let removed = state.content.remove(name, &key).await?;
    tracing::info!("User {} removed '{}' from {}", user.id(), key, name);

    Ok(Json(json!({
        "message": "Config entry removed",
        "key": key,
        "data": removed,
    })))
}
