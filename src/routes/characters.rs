use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::content_store::{lookup, ContentStore};
use crate::db::{self, characters::SkillSeed};
use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, OwnedCharacter, VisibleCharacter};
use crate::models::character::CharacterSummary;
use crate::models::character_input::{
    CharacterUpdate, ItemPatch, ItemRef, NewCharacter, NewFeature, NewItem, NewProficiency,
    NewSpell, NewWeapon, SkillPatch, SlotRef, SpellRef, SpellSlotInput,
};
use crate::models::CharacterSheet;
use crate::routes::validation::{parse_id, AppJson};
use crate::routes::ApiResponse;
use crate::rules;
use crate::AppState;

type SheetResponse = Json<ApiResponse<CharacterSheet>>;

/// Attach content-store definitions for the race, class, spells and items
async fn enrich(mut sheet: CharacterSheet, content: &ContentStore) -> Result<CharacterSheet> {
    let races = content.read("races").await?;
    let classes = content.read("classes").await?;
    let spells = content.read("spells").await?;
    let items = content.read("items").await?;

    sheet.race_data = lookup(&races, &sheet.basic_info.race).cloned();
    sheet.class_data = lookup(&classes, &sheet.basic_info.class_name).cloned();
    for spell in &mut sheet.magic.spells {
        spell.spell_data = lookup(&spells, &spell.spell_name).cloned();
    }
    for item in &mut sheet.inventory {
        item.item_data = lookup(&items, &item.item_name).cloned();
    }
    Ok(sheet)
}

/// Fetch and enrich a character, 404 when it is gone
pub(crate) async fn load_sheet(state: &AppState, id: i64) -> Result<CharacterSheet> {
    let sheet = db::characters::fetch_character(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Character"))?;
    enrich(sheet, &state.content).await
}

pub(crate) async fn sheet_with_message(
    state: &AppState,
    id: i64,
    message: impl Into<String>,
) -> Result<SheetResponse> {
    let sheet = load_sheet(state, id).await?;
    Ok(Json(ApiResponse::with_message(sheet, message)))
}

/// Skill rows every new character starts with, one per skill definition
fn skill_seeds(skills: &serde_json::Map<String, Value>) -> Vec<SkillSeed> {
    skills
        .iter()
        .filter_map(|(key, def)| {
            let ability = def.get("ability").and_then(Value::as_str)?;
            Some(SkillSeed {
                name: key.clone(),
                ability: ability.to_ascii_lowercase(),
            })
        })
        .collect()
}

pub async fn list_characters(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<CharacterSummary>>>> {
    let characters = db::characters::list_characters(&state.pool, user.id()).await?;
    Ok(Json(ApiResponse::ok(characters)))
}

/// Create a character for the caller
///
/// Race and class must name entries of the content store. The class's
/// `hit_die` drives the default hit points.
pub async fn create_character(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(input): AppJson<NewCharacter>,
) -> Result<(StatusCode, SheetResponse)> {
    input.validate()?;

    if state.content.get("races", &input.race).await?.is_none() {
        return Err(AppError::InvalidInput(format!(
            "Race \"{}\" not found",
            input.race
        )));
    }
    if state.content.get("classes", &input.class_name).await?.is_none() {
        return Err(AppError::InvalidInput(format!(
            "Class \"{}\" not found",
            input.class_name
        )));
    }

    let hit_die = state
        .content
        .class_hit_die(&input.class_name)
        .await?
        .unwrap_or_else(|| rules::hit_die_for_class(&input.class_name));
    let skills = skill_seeds(&state.content.read("skills").await?);

    let id =
        db::characters::create_character(&state.pool, user.id(), &input, hit_die, &skills).await?;

    let sheet = load_sheet(&state, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(sheet, "Character created")),
    ))
}

pub async fn get_character(
    State(state): State<AppState>,
    character: VisibleCharacter,
) -> Result<SheetResponse> {
    let sheet = load_sheet(&state, character.id).await?;
    Ok(Json(ApiResponse::ok(sheet)))
}

/// Public read without a token; private characters look absent
pub async fn get_public_character(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<SheetResponse> {
    let id = parse_id(&raw_id, "Character")?;
    let visible = db::characters::access_info(&state.pool, id)
        .await?
        .is_some_and(|info| info.is_public);
    if !visible {
        return Err(AppError::not_found("Public character"));
    }
    let sheet = load_sheet(&state, id).await?;
    Ok(Json(ApiResponse::ok(sheet)))
}

pub async fn update_character(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(update): AppJson<CharacterUpdate>,
) -> Result<SheetResponse> {
    if update.is_empty() {
        return Err(AppError::InvalidInput("Nothing to update".to_string()));
    }
    if let Some(info) = &update.basic_info {
        if let Some(race) = &info.race {
            if state.content.get("races", race).await?.is_none() {
                return Err(AppError::InvalidInput(format!("Race \"{}\" not found", race)));
            }
        }
        if let Some(class) = &info.class_name {
            if state.content.get("classes", class).await?.is_none() {
                return Err(AppError::InvalidInput(format!("Class \"{}\" not found", class)));
            }
        }
    }

    if !db::characters::update_character(&state.pool, character.id, &update).await? {
        return Err(AppError::not_found("Character"));
    }
    sheet_with_message(&state, character.id, "Character updated").await
}

pub async fn delete_character(
    State(state): State<AppState>,
    character: OwnedCharacter,
) -> Result<Json<ApiResponse<Value>>> {
    if !db::characters::delete_character(&state.pool, character.id).await? {
        return Err(AppError::not_found("Character"));
    }
    tracing::info!("User {} deleted character {}", character.user.id(), character.id);
    Ok(Json(ApiResponse::with_message(
        serde_json::json!({ "id": character.id }),
        "Character deleted",
    )))
}

// =============================================================================
// Inventory, weapons, spells, features
// =============================================================================

pub async fn add_item(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(item): AppJson<NewItem>,
) -> Result<SheetResponse> {
    db::characters::add_item(&state.pool, character.id, &item).await?;
    sheet_with_message(&state, character.id, "Item added to inventory").await
}

pub async fn update_item(
    State(state): State<AppState>,
    character: OwnedCharacter,
    Path((_, item_id)): Path<(String, String)>,
    AppJson(patch): AppJson<ItemPatch>,
) -> Result<SheetResponse> {
    let item_id = parse_id(&item_id, "Item")?;
    db::characters::update_item(&state.pool, character.id, item_id, &patch).await?;
    sheet_with_message(&state, character.id, "Item updated").await
}

pub async fn remove_item(
    State(state): State<AppState>,
    character: OwnedCharacter,
    Path((_, item_id)): Path<(String, String)>,
) -> Result<SheetResponse> {
    let item_id = parse_id(&item_id, "Item")?;
    db::characters::remove_item(&state.pool, character.id, item_id).await?;
    sheet_with_message(&state, character.id, "Item removed from inventory").await
}

pub async fn equip_item(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<ItemRef>,
) -> Result<SheetResponse> {
    db::characters::set_item_equipped(&state.pool, character.id, body.item_id, true).await?;
    sheet_with_message(&state, character.id, "Item equipped").await
}

pub async fn unequip_item(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<ItemRef>,
) -> Result<SheetResponse> {
    db::characters::set_item_equipped(&state.pool, character.id, body.item_id, false).await?;
    sheet_with_message(&state, character.id, "Item unequipped").await
}

pub async fn add_weapon(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(weapon): AppJson<NewWeapon>,
) -> Result<SheetResponse> {
    db::characters::add_weapon(&state.pool, character.id, &weapon).await?;
    sheet_with_message(&state, character.id, "Weapon added").await
}

pub async fn add_spell(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(spell): AppJson<NewSpell>,
) -> Result<SheetResponse> {
    db::characters::add_spell(&state.pool, character.id, &spell).await?;
    sheet_with_message(&state, character.id, "Spell added").await
}

pub async fn prepare_spell(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<SpellRef>,
) -> Result<SheetResponse> {
    db::characters::set_spell_prepared(&state.pool, character.id, body.spell_id, true).await?;
    sheet_with_message(&state, character.id, "Spell prepared").await
}

pub async fn unprepare_spell(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<SpellRef>,
) -> Result<SheetResponse> {
    db::characters::set_spell_prepared(&state.pool, character.id, body.spell_id, false).await?;
    sheet_with_message(&state, character.id, "Spell unprepared").await
}

pub async fn set_spell_slot(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(slot): AppJson<SpellSlotInput>,
) -> Result<SheetResponse> {
    db::characters::set_spell_slot(&state.pool, character.id, slot).await?;
    sheet_with_message(&state, character.id, "Spell slots updated").await
}

pub async fn use_spell_slot(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(body): AppJson<SlotRef>,
) -> Result<SheetResponse> {
    let slot = db::characters::use_spell_slot(&state.pool, character.id, body.level).await?;
    sheet_with_message(
        &state,
        character.id,
        format!("Level {} slot used, {} left", slot.level, slot.remaining()),
    )
    .await
}

pub async fn add_feature(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(feature): AppJson<NewFeature>,
) -> Result<SheetResponse> {
    db::characters::add_feature(&state.pool, character.id, &feature).await?;
    sheet_with_message(&state, character.id, "Feature added").await
}

pub async fn add_proficiency(
    State(state): State<AppState>,
    character: OwnedCharacter,
    AppJson(proficiency): AppJson<NewProficiency>,
) -> Result<SheetResponse> {
    db::characters::add_proficiency(&state.pool, character.id, &proficiency).await?;
    sheet_with_message(&state, character.id, "Proficiency added").await
}

pub async fn update_skill(
    State(state): State<AppState>,
    character: OwnedCharacter,
    Path((_, skill_id)): Path<(String, String)>,
    AppJson(patch): AppJson<SkillPatch>,
) -> Result<SheetResponse> {
    let skill_id = parse_id(&skill_id, "Skill")?;
    db::characters::update_skill(&state.pool, character.id, skill_id, patch).await?;
    sheet_with_message(&state, character.id, "Skill updated").await
}
