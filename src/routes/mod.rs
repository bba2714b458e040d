pub mod auth;
pub mod characters;
pub mod combat;
pub mod configs;
pub mod health;
pub mod profile;
pub mod sessions;
pub mod tokens;
pub mod validation;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;

use crate::realtime::ws_handler;
use crate::AppState;

pub use health::health_check;

/// `{success, message?, data}` envelope used by the character routes
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

fn character_routes() -> Router<AppState> {
    use characters::*;

    Router::new()
        .route("/", get(list_characters).post(create_character))
        .route("/my", get(list_characters))
        .route("/public/:id", get(get_public_character))
        .route(
            "/:id",
            get(get_character)
                .put(update_character)
                .delete(delete_character),
        )
        .route("/:id/items", post(add_item))
        .route("/:id/items/:itemId", put(update_item).delete(remove_item))
        .route("/:id/inventory/equip", post(equip_item))
        .route("/:id/inventory/unequip", post(unequip_item))
        .route("/:id/weapons", post(add_weapon))
        .route("/:id/spells", post(add_spell))
        .route("/:id/spells/prepare", post(prepare_spell))
        .route("/:id/spells/unprepare", post(unprepare_spell))
        .route("/:id/spell-slots", put(set_spell_slot))
        .route("/:id/spell-slots/use", post(use_spell_slot))
        .route("/:id/features", post(add_feature))
        .route("/:id/proficiencies", post(add_proficiency))
        .route("/:id/skills/:skillId", put(update_skill))
        .route("/:id/combat/damage", post(combat::take_damage))
        .route("/:id/combat/heal", post(combat::heal))
        .route("/:id/rest/short", post(combat::short_rest))
        .route("/:id/rest/long", post(combat::long_rest))
}

fn session_routes() -> Router<AppState> {
    use sessions::*;

    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route("/:id", get(get_session).delete(delete_session))
        .route("/:id/join", post(join_session))
        .route(
            "/:id/tokens",
            get(tokens::list_tokens).post(tokens::create_token),
        )
        .route(
            "/:id/tokens/:tokenId",
            put(tokens::update_token).delete(tokens::delete_token),
        )
}

fn config_routes() -> Router<AppState> {
    use configs::*;

    Router::new()
        .route("/", get(get_all_configs))
        .route("/stats", get(get_stats))
        .route("/search", get(search_configs))
        .route(
            "/:name",
            get(get_config).post(add_config_entry).put(update_config),
        )
        .route("/:name/:key", delete(remove_config_entry))
}

/// Every HTTP and socket route, without the outer middleware layers
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/users", get(auth::list_users))
        .route(
            "/api/profile/me",
            get(profile::get_profile).put(profile::update_profile),
        )
        .nest("/api/characters", character_routes())
        .nest("/api/sessions", session_routes())
        .nest("/api/configs", config_routes())
        .route("/socket", get(ws_handler))
        .with_state(state)
}
