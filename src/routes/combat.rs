use axum::{extract::State, Json};

use crate::db;
use crate::error::Result;
use crate::middleware::OwnedCharacter;
use crate::models::character_input::{
    require_positive, DamageRequest, HealRequest, ShortRestRequest,
};
use crate::models::CharacterSheet;
use crate::routes::characters::sheet_with_message;
use crate::routes::validation::AppJson;
use crate::routes::ApiResponse;
use crate::AppState;

/// Damage drains temporary hit points first, then current hit points
pub async fn take_damage(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<DamageRequest>,
) -> Result<Json<ApiResponse<CharacterSheet>>> {
    let damage = require_positive("damage", body.damage)?;
    let (current, temporary) = db::characters::apply_damage(&state.pool, character.id, damage).await?;

    let kind = body.damage_type.as_deref().unwrap_or("untyped");
    tracing::info!(
        "Character {} took {} {} damage ({} hp, {} temp)",
        character.id,
        damage,
        kind,
        current,
        temporary
    );
    sheet_with_message(
        &state,
        character.id,
        format!("Took {} {} damage", damage, kind),
    )
    .await
}

pub async fn heal(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<HealRequest>,
) -> Result<Json<ApiResponse<CharacterSheet>>> {
    let healing = require_positive("healing", body.healing)?;
    let current = db::characters::apply_healing(&state.pool, character.id, healing).await?;
    tracing::info!("Character {} healed to {} hp", character.id, current);
    sheet_with_message(&state, character.id, format!("Healed {} hit points", healing)).await
}

/// Spend hit dice; a missing body spends none
pub async fn short_rest(
    State(state): State<AppState>,
    character: OwnedCharacter,
    body: Option<AppJson<ShortRestRequest>>,
) -> Result<Json<ApiResponse<CharacterSheet>>> {
    let request = body.map(|AppJson(b)| b).unwrap_or_default();
    let outcome = db::characters::short_rest(&state.pool, character.id, request.hit_dice_used).await?;
    sheet_with_message(
        &state,
        character.id,
        format!(
            "Short rest: spent {} hit dice, recovered {} hit points",
            outcome.dice_used, outcome.hp_recovered
        ),
    )
    .await
}

pub async fn long_rest(
    State(state): State<AppState>,
    character: OwnedCharacter,
) -> Result<Json<ApiResponse<CharacterSheet>>> {
    db::characters::long_rest(&state.pool, character.id).await?;
    tracing::info!("Character {} took a long rest", character.id);
    sheet_with_message(&state, character.id, "Long rest complete").await
}
