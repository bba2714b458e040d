//! Character aggregate persistence.
//!
//! Every operation that touches more than one statement runs inside a single
//! transaction, so readers never observe a half-written character.

use sqlx::{SqliteConnection, SqlitePool};

use crate::constants::*;
use crate::error::{AppError, Result};
use crate::models::character::{
    AbilityScores, CharacterParts, CharacterRow, CharacterSheet, CharacterSummary, Feature,
    InventoryItem, Proficiency, SkillRow, Spell, SpellSlot, Weapon,
};
use crate::models::character_input::{
    CharacterUpdate, ItemPatch, NewCharacter, NewFeature, NewItem, NewProficiency, NewSpell,
    NewWeapon, SkillPatch, SpellSlotInput,
};
use crate::rules::{self, HitDice, ShortRestOutcome};

/// A skill row to create alongside a new character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillSeed {
    pub name: String,
    pub ability: String,
}

/// Owner and visibility of a character, for access checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct CharacterAccessInfo {
    pub user_id: i64,
    pub is_public: bool,
}

pub async fn access_info(pool: &SqlitePool, id: i64) -> Result<Option<CharacterAccessInfo>> {
    let info = sqlx::query_as::<_, CharacterAccessInfo>(
        "SELECT user_id, is_public FROM characters WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(info)
}

// =============================================================================
// Read
// =============================================================================

async fn load_core(conn: &mut SqliteConnection, id: i64) -> Result<Option<CharacterRow>> {
    let row = sqlx::query_as::<_, CharacterRow>("SELECT * FROM characters WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

async fn load_abilities(conn: &mut SqliteConnection, id: i64) -> Result<AbilityScores> {
    let scores = sqlx::query_as::<_, AbilityScores>(
        "SELECT strength, dexterity, constitution, intelligence, wisdom, charisma
         FROM character_abilities WHERE character_id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(scores.unwrap_or_default())
}

/// Load the full character document, or `None` when the core row is missing
///
/// All reads share one transaction, so the sections are a consistent
/// snapshot.
pub async fn fetch_character(pool: &SqlitePool, id: i64) -> Result<Option<CharacterSheet>> {
    let mut tx = pool.begin().await?;

    let Some(core) = load_core(&mut tx, id).await? else {
        return Ok(None);
    };

    let abilities = load_abilities(&mut tx, id).await?;

    let skills = sqlx::query_as::<_, SkillRow>(
        "SELECT id, name, ability, proficient, expertise
         FROM character_skills WHERE character_id = ? ORDER BY name",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let features = sqlx::query_as::<_, Feature>(
        "SELECT id, name, description, source, uses_per_day, current_uses, is_active
         FROM character_features WHERE character_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let proficiencies = sqlx::query_as::<_, Proficiency>(
        "SELECT id, kind, name FROM character_proficiencies
         WHERE character_id = ? ORDER BY kind, name",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let inventory = sqlx::query_as::<_, InventoryItem>(
        "SELECT id, item_name, item_type, quantity, weight, description, equipped
         FROM character_inventory WHERE character_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let weapons = sqlx::query_as::<_, Weapon>(
        "SELECT id, name, damage_dice, damage_type, ability, attack_bonus, weapon_range,
                properties, description, equipped
         FROM character_weapons WHERE character_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let spells = sqlx::query_as::<_, Spell>(
        "SELECT id, spell_name, level, school, prepared, concentration, ritual, description
         FROM character_spells WHERE character_id = ? ORDER BY level, spell_name",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let spell_slots = sqlx::query_as::<_, SpellSlot>(
        "SELECT level, total, used FROM character_spell_slots
         WHERE character_id = ? ORDER BY level",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(CharacterSheet::assemble(CharacterParts {
        core,
        abilities,
        skills,
        features,
        proficiencies,
        inventory,
        weapons,
        spells,
        spell_slots,
    })))
}

/// Summaries of a user's characters, most recently updated first
pub async fn list_characters(pool: &SqlitePool, user_id: i64) -> Result<Vec<CharacterSummary>> {
    let rows = sqlx::query_as::<_, CharacterSummary>(
        "SELECT id, name, race, class, level, current_hp, max_hp, armor_class,
                portrait_url, is_public, updated_at
         FROM characters WHERE user_id = ?
         ORDER BY updated_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// =============================================================================
// Create / update / delete
// =============================================================================

/// Insert a character with defaults filled in, returning its id
///
/// The core row, the ability row and one skill row per seed are written in
/// one transaction.
pub async fn create_character(
    pool: &SqlitePool,
    owner_id: i64,
    input: &NewCharacter,
    hit_die: i64,
    skills: &[SkillSeed],
) -> Result<i64> {
    let level = input.level.unwrap_or(MIN_LEVEL);
    let abilities = input
        .abilities
        .unwrap_or_default()
        .merged_onto(AbilityScores::default());

    let max_hp = input
        .max_hp
        .unwrap_or_else(|| rules::default_max_hp(level, hit_die, abilities.constitution));
    let current_hp = input.current_hp.unwrap_or(max_hp).min(max_hp);

    let hit_dice = match input.hit_dice.as_deref() {
        Some(s) => HitDice::parse(s),
        None => HitDice::new(level, hit_die),
    };

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO characters (
            user_id, name, race, subrace, class, subclass, level, background, alignment,
            max_hp, current_hp, armor_class, speed, initiative, proficiency_bonus,
            passive_perception, hit_dice, current_hit_dice, condition,
            copper, silver, electrum, gold, platinum, spellcasting_ability, is_public
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(owner_id)
    .bind(input.name.trim())
    .bind(input.race.trim())
    .bind(&input.subrace)
    .bind(input.class_name.trim())
    .bind(&input.subclass)
    .bind(level)
    .bind(input.background.as_deref().unwrap_or(""))
    .bind(input.alignment.as_deref().unwrap_or(""))
    .bind(max_hp)
    .bind(current_hp)
    .bind(input.armor_class.unwrap_or(DEFAULT_ARMOR_CLASS))
    .bind(input.speed.unwrap_or(DEFAULT_SPEED))
    .bind(input.initiative.unwrap_or(0))
    .bind(rules::proficiency_bonus(level))
    .bind(input.passive_perception.unwrap_or(DEFAULT_PASSIVE_PERCEPTION))
    .bind(hit_dice.to_string())
    .bind(hit_dice.count)
    .bind(DEFAULT_CONDITION)
    .bind(input.economy.copper.unwrap_or(0))
    .bind(input.economy.silver.unwrap_or(0))
    .bind(input.economy.electrum.unwrap_or(0))
    .bind(input.economy.gold.unwrap_or(0))
    .bind(input.economy.platinum.unwrap_or(0))
    .bind(input.spellcasting_ability.as_deref().map(str::to_ascii_lowercase))
    .bind(input.is_public.unwrap_or(false))
    .fetch_one(&mut *tx)
    .await?;

    write_abilities(&mut tx, id, &abilities).await?;

    for skill in skills {
        sqlx::query(
            "INSERT INTO character_skills (character_id, name, ability) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(&skill.name)
        .bind(&skill.ability)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!("Created character {} for user {}", id, owner_id);
    Ok(id)
}

async fn write_abilities(conn: &mut SqliteConnection, id: i64, a: &AbilityScores) -> Result<()> {
    sqlx::query(
        "INSERT INTO character_abilities
            (character_id, strength, dexterity, constitution, intelligence, wisdom, charisma)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(character_id) DO UPDATE SET
            strength = excluded.strength,
            dexterity = excluded.dexterity,
            constitution = excluded.constitution,
            intelligence = excluded.intelligence,
            wisdom = excluded.wisdom,
            charisma = excluded.charisma",
    )
    .bind(id)
    .bind(a.strength)
    .bind(a.dexterity)
    .bind(a.constitution)
    .bind(a.intelligence)
    .bind(a.wisdom)
    .bind(a.charisma)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn set_if<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn set_opt_if(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

/// Apply a partial update to the stored row
///
/// Returns an error when the merged hit points are inconsistent.
fn apply_update(row: &mut CharacterRow, update: &CharacterUpdate) -> Result<()> {
    if let Some(info) = &update.basic_info {
        let old_level = row.level;
        set_if(&mut row.name, info.name.as_ref().map(|s| s.trim().to_string()));
        set_if(&mut row.race, info.race.as_ref().map(|s| s.trim().to_string()));
        set_opt_if(&mut row.subrace, &info.subrace);
        set_if(
            &mut row.class_name,
            info.class_name.as_ref().map(|s| s.trim().to_string()),
        );
        set_opt_if(&mut row.subclass, &info.subclass);
        set_if(&mut row.level, info.level);
        set_if(&mut row.experience, info.experience);
        set_if(&mut row.background, info.background.clone());
        set_if(&mut row.alignment, info.alignment.clone());
        if let Some(ability) = &info.spellcasting_ability {
            row.spellcasting_ability = Some(ability.trim().to_ascii_lowercase());
        }
        if row.level != old_level {
            row.proficiency_bonus = rules::proficiency_bonus(row.level);
        }
    }

    if let Some(combat) = &update.combat {
        let mut explicit_current = None;
        if let Some(hp) = combat.hit_points {
            set_if(&mut row.max_hp, hp.max);
            set_if(&mut row.current_hp, hp.current);
            set_if(&mut row.temporary_hp, hp.temporary);
            explicit_current = hp.current;
        }
        if let Some(current) = explicit_current {
            if current > row.max_hp {
                return Err(AppError::InvalidInput(
                    "Current hit points cannot exceed max hit points".to_string(),
                ));
            }
        }
        set_if(&mut row.armor_class, combat.armor_class);
        set_if(&mut row.speed, combat.speed);
        set_if(&mut row.initiative, combat.initiative);
        set_if(&mut row.proficiency_bonus, combat.proficiency_bonus);
        set_if(&mut row.passive_perception, combat.passive_perception);
        if let Some(dice) = &combat.hit_dice {
            row.hit_dice = HitDice::parse(dice).to_string();
        }
        set_if(&mut row.current_hit_dice, combat.current_hit_dice);
        if let Some(saves) = combat.death_saves {
            set_if(&mut row.death_saves_success, saves.successes);
            set_if(&mut row.death_saves_failure, saves.failures);
        }
        set_if(&mut row.condition, combat.condition.clone());
    }

    // A lowered maximum pulls current values down with it.
    row.current_hp = row.current_hp.min(row.max_hp);
    row.current_hit_dice = row
        .current_hit_dice
        .min(HitDice::parse(&row.hit_dice).count);

    if let Some(economy) = &update.economy {
        set_if(&mut row.copper, economy.copper);
        set_if(&mut row.silver, economy.silver);
        set_if(&mut row.electrum, economy.electrum);
        set_if(&mut row.gold, economy.gold);
        set_if(&mut row.platinum, economy.platinum);
    }

    if let Some(d) = &update.description {
        set_opt_if(&mut row.portrait_url, &d.portrait_url);
        set_opt_if(&mut row.appearance, &d.appearance);
        set_opt_if(&mut row.personality_traits, &d.personality_traits);
        set_opt_if(&mut row.ideals, &d.ideals);
        set_opt_if(&mut row.bonds, &d.bonds);
        set_opt_if(&mut row.flaws, &d.flaws);
        set_opt_if(&mut row.backstory, &d.backstory);
        set_opt_if(&mut row.notes, &d.notes);
    }

    set_if(&mut row.is_public, update.is_public);
    Ok(())
}

/// Apply a partial update in one transaction
///
/// Returns `false` when the character does not exist.
pub async fn update_character(pool: &SqlitePool, id: i64, update: &CharacterUpdate) -> Result<bool> {
    update.validate()?;

    let mut tx = pool.begin().await?;

    let Some(mut row) = load_core(&mut tx, id).await? else {
        return Ok(false);
    };
    apply_update(&mut row, update)?;

    sqlx::query(
        "UPDATE characters SET
            name = ?, race = ?, subrace = ?, class = ?, subclass = ?, level = ?,
            experience = ?, background = ?, alignment = ?,
            max_hp = ?, current_hp = ?, temporary_hp = ?, armor_class = ?, speed = ?,
            initiative = ?, proficiency_bonus = ?, passive_perception = ?,
            hit_dice = ?, current_hit_dice = ?, death_saves_success = ?,
            death_saves_failure = ?, condition = ?,
            copper = ?, silver = ?, electrum = ?, gold = ?, platinum = ?,
            spellcasting_ability = ?,
            portrait_url = ?, appearance = ?, personality_traits = ?, ideals = ?,
            bonds = ?, flaws = ?, backstory = ?, notes = ?,
            is_public = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?",
    )
    .bind(&row.name)
    .bind(&row.race)
    .bind(&row.subrace)
    .bind(&row.class_name)
    .bind(&row.subclass)
    .bind(row.level)
    .bind(row.experience)
    .bind(&row.background)
    .bind(&row.alignment)
    .bind(row.max_hp)
    .bind(row.current_hp)
    .bind(row.temporary_hp)
    .bind(row.armor_class)
    .bind(row.speed)
    .bind(row.initiative)
    .bind(row.proficiency_bonus)
    .bind(row.passive_perception)
    .bind(&row.hit_dice)
    .bind(row.current_hit_dice)
    .bind(row.death_saves_success)
    .bind(row.death_saves_failure)
    .bind(&row.condition)
    .bind(row.copper)
    .bind(row.silver)
    .bind(row.electrum)
    .bind(row.gold)
    .bind(row.platinum)
    .bind(&row.spellcasting_ability)
    .bind(&row.portrait_url)
    .bind(&row.appearance)
    .bind(&row.personality_traits)
    .bind(&row.ideals)
    .bind(&row.bonds)
    .bind(&row.flaws)
    .bind(&row.backstory)
    .bind(&row.notes)
    .bind(row.is_public)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(patch) = &update.abilities {
        if !patch.is_empty() {
            let current = load_abilities(&mut tx, id).await?;
            write_abilities(&mut tx, id, &patch.merged_onto(current)).await?;
        }
    }

    tx.commit().await?;

    tracing::info!("Updated character {}", id);
    Ok(true)
}

/// Delete a character; child rows cascade
pub async fn delete_character(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM characters WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn touch(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE characters SET updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now') WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

// =============================================================================
// Child rows
// =============================================================================

pub async fn add_item(pool: &SqlitePool, character_id: i64, item: &NewItem) -> Result<InventoryItem> {
    item.validate()?;
    let row = sqlx::query_as::<_, InventoryItem>(
        "INSERT INTO character_inventory
            (character_id, item_name, item_type, quantity, weight, description, equipped)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id, item_name, item_type, quantity, weight, description, equipped",
    )
    .bind(character_id)
    .bind(item.item_name.trim())
    .bind(item.item_type.as_deref().unwrap_or("gear"))
    .bind(item.quantity.unwrap_or(1))
    .bind(item.weight.unwrap_or(0.0))
    .bind(item.description.as_deref().unwrap_or(""))
    .bind(item.equipped)
    .fetch_one(pool)
    .await?;
    touch(pool, character_id).await?;
    Ok(row)
}

pub async fn update_item(
    pool: &SqlitePool,
    character_id: i64,
    item_id: i64,
    patch: &ItemPatch,
) -> Result<InventoryItem> {
    patch.validate()?;
    let row = sqlx::query_as::<_, InventoryItem>(
        "UPDATE character_inventory SET
            item_name = COALESCE(?, item_name),
            item_type = COALESCE(?, item_type),
            quantity = COALESCE(?, quantity),
            weight = COALESCE(?, weight),
            description = COALESCE(?, description),
            equipped = COALESCE(?, equipped)
         WHERE id = ? AND character_id = ?
         RETURNING id, item_name, item_type, quantity, weight, description, equipped",
    )
    .bind(patch.item_name.as_deref().map(str::trim))
    .bind(&patch.item_type)
    .bind(patch.quantity)
    .bind(patch.weight)
    .bind(&patch.description)
    .bind(patch.equipped)
    .bind(item_id)
    .bind(character_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Item"))?;
    touch(pool, character_id).await?;
    Ok(row)
}

pub async fn remove_item(pool: &SqlitePool, character_id: i64, item_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM character_inventory WHERE id = ? AND character_id = ?")
        .bind(item_id)
        .bind(character_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Item"));
    }
    touch(pool, character_id).await
}

pub async fn set_item_equipped(
    pool: &SqlitePool,
    character_id: i64,
    item_id: i64,
    equipped: bool,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE character_inventory SET equipped = ? WHERE id = ? AND character_id = ?",
    )
    .bind(equipped)
    .bind(item_id)
    .bind(character_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Item"));
    }
    touch(pool, character_id).await
}

pub async fn add_weapon(pool: &SqlitePool, character_id: i64, weapon: &NewWeapon) -> Result<Weapon> {
    weapon.validate()?;
    let row = sqlx::query_as::<_, Weapon>(
        "INSERT INTO character_weapons
            (character_id, name, damage_dice, damage_type, ability, attack_bonus,
             weapon_range, properties, description, equipped)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id, name, damage_dice, damage_type, ability, attack_bonus, weapon_range,
                   properties, description, equipped",
    )
    .bind(character_id)
    .bind(weapon.name.trim())
    .bind(weapon.damage_dice.trim())
    .bind(weapon.damage_type.as_deref().unwrap_or(""))
    .bind(
        weapon
            .ability
            .as_deref()
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "strength".to_string()),
    )
    .bind(weapon.attack_bonus.unwrap_or(0))
    .bind(&weapon.range)
    .bind(&weapon.properties)
    .bind(&weapon.description)
    .bind(weapon.equipped)
    .fetch_one(pool)
    .await?;
    touch(pool, character_id).await?;
    Ok(row)
}

pub async fn add_spell(pool: &SqlitePool, character_id: i64, spell: &NewSpell) -> Result<Spell> {
    spell.validate()?;
    let row = sqlx::query_as::<_, Spell>(
        "INSERT INTO character_spells
            (character_id, spell_name, level, school, prepared, concentration, ritual, description)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id, spell_name, level, school, prepared, concentration, ritual, description",
    )
    .bind(character_id)
    .bind(spell.spell_name.trim())
    .bind(spell.level.unwrap_or(0))
    .bind(spell.school.as_deref().unwrap_or(""))
    .bind(spell.prepared)
    .bind(spell.concentration)
    .bind(spell.ritual)
    .bind(spell.description.as_deref().unwrap_or(""))
    .fetch_one(pool)
    .await?;
    touch(pool, character_id).await?;
    Ok(row)
}

pub async fn set_spell_prepared(
    pool: &SqlitePool,
    character_id: i64,
    spell_id: i64,
    prepared: bool,
) -> Result<()> {
    let result =
        sqlx::query("UPDATE character_spells SET prepared = ? WHERE id = ? AND character_id = ?")
            .bind(prepared)
            .bind(spell_id)
            .bind(character_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Spell"));
    }
    touch(pool, character_id).await
}

pub async fn add_feature(
    pool: &SqlitePool,
    character_id: i64,
    feature: &NewFeature,
) -> Result<Feature> {
    feature.validate()?;
    let row = sqlx::query_as::<_, Feature>(
        "INSERT INTO character_features
            (character_id, name, description, source, uses_per_day, current_uses, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING id, name, description, source, uses_per_day, current_uses, is_active",
    )
    .bind(character_id)
    .bind(feature.name.trim())
    .bind(feature.description.as_deref().unwrap_or(""))
    .bind(feature.source.as_deref().unwrap_or(""))
    .bind(feature.uses_per_day)
    .bind(feature.current_uses.or(feature.uses_per_day).unwrap_or(0))
    .bind(feature.is_active.unwrap_or(true))
    .fetch_one(pool)
    .await?;
    touch(pool, character_id).await?;
    Ok(row)
}

pub async fn add_proficiency(
    pool: &SqlitePool,
    character_id: i64,
    proficiency: &NewProficiency,
) -> Result<Proficiency> {
    proficiency.validate()?;
    let row = sqlx::query_as::<_, Proficiency>(
        "INSERT INTO character_proficiencies (character_id, kind, name)
         VALUES (?, ?, ?)
         RETURNING id, kind, name",
    )
    .bind(character_id)
    .bind(proficiency.kind.trim().to_ascii_lowercase())
    .bind(proficiency.name.trim())
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Proficiency already recorded".to_string())
        }
        _ => AppError::Database(e),
    })?;
    touch(pool, character_id).await?;
    Ok(row)
}

pub async fn update_skill(
    pool: &SqlitePool,
    character_id: i64,
    skill_id: i64,
    patch: SkillPatch,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE character_skills SET
            proficient = COALESCE(?, proficient),
            expertise = COALESCE(?, expertise)
         WHERE id = ? AND character_id = ?",
    )
    .bind(patch.proficient)
    .bind(patch.expertise)
    .bind(skill_id)
    .bind(character_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Skill"));
    }
    touch(pool, character_id).await
}

/// Set the slot total for one spell level; `used` is clamped to the total
pub async fn set_spell_slot(
    pool: &SqlitePool,
    character_id: i64,
    slot: SpellSlotInput,
) -> Result<SpellSlot> {
    slot.validate()?;
    let row = sqlx::query_as::<_, SpellSlot>(
        "INSERT INTO character_spell_slots (character_id, level, total, used)
         VALUES (?1, ?2, ?3, MIN(COALESCE(?4, 0), ?3))
         ON CONFLICT(character_id, level) DO UPDATE SET
            total = excluded.total,
            used = MIN(COALESCE(?4, character_spell_slots.used), excluded.total)
         RETURNING level, total, used",
    )
    .bind(character_id)
    .bind(slot.level)
    .bind(slot.total)
    .bind(slot.used)
    .fetch_one(pool)
    .await?;
    touch(pool, character_id).await?;
    Ok(row)
}

/// Spend one slot of the given level
pub async fn use_spell_slot(pool: &SqlitePool, character_id: i64, level: i64) -> Result<SpellSlot> {
    let spent = sqlx::query_as::<_, SpellSlot>(
        "UPDATE character_spell_slots SET used = used + 1
         WHERE character_id = ? AND level = ? AND used < total
         RETURNING level, total, used",
    )
    .bind(character_id)
    .bind(level)
    .fetch_optional(pool)
    .await?;

    if let Some(slot) = spent {
        touch(pool, character_id).await?;
        return Ok(slot);
    }

    let exists: Option<i64> = sqlx::query_scalar(
        "SELECT level FROM character_spell_slots WHERE character_id = ? AND level = ?",
    )
    .bind(character_id)
    .bind(level)
    .fetch_optional(pool)
    .await?;

    match exists {
        Some(_) => Err(AppError::InvalidInput(format!(
            "No level {} spell slots remaining",
            level
        ))),
        None => Err(AppError::not_found("Spell slot")),
    }
}

// =============================================================================
// Combat and rest
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct HpState {
    current_hp: i64,
    max_hp: i64,
    temporary_hp: i64,
    hit_dice: String,
    current_hit_dice: i64,
}

async fn load_hp(conn: &mut SqliteConnection, id: i64) -> Result<HpState> {
    sqlx::query_as::<_, HpState>(
        "SELECT current_hp, max_hp, temporary_hp, hit_dice, current_hit_dice
         FROM characters WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Character"))
}

/// Apply damage and return `(current_hp, temporary_hp)`
pub async fn apply_damage(pool: &SqlitePool, id: i64, damage: i64) -> Result<(i64, i64)> {
    let mut tx = pool.begin().await?;
    let hp = load_hp(&mut tx, id).await?;
    let (current, temporary) = rules::apply_damage(hp.current_hp, hp.temporary_hp, damage);

    sqlx::query(
        "UPDATE characters SET current_hp = ?, temporary_hp = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?",
    )
    .bind(current)
    .bind(temporary)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((current, temporary))
}

/// Apply healing and return the new current hit points
pub async fn apply_healing(pool: &SqlitePool, id: i64, healing: i64) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let hp = load_hp(&mut tx, id).await?;
    let current = rules::apply_healing(hp.current_hp, hp.max_hp, healing).max(hp.current_hp);

    sqlx::query(
        "UPDATE characters SET current_hp = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?",
    )
    .bind(current)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(current)
}

pub async fn short_rest(pool: &SqlitePool, id: i64, dice_requested: i64) -> Result<ShortRestOutcome> {
    let mut tx = pool.begin().await?;
    let hp = load_hp(&mut tx, id).await?;
    let faces = HitDice::parse(&hp.hit_dice).faces;
    let outcome = rules::short_rest(
        hp.current_hp,
        hp.max_hp,
        hp.current_hit_dice,
        faces,
        dice_requested,
    );

    sqlx::query(
        "UPDATE characters SET current_hp = ?, current_hit_dice = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?",
    )
    .bind(outcome.current_hp)
    .bind(outcome.remaining_dice)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(outcome)
}

/// Restore hit points, hit dice, death saves, spell slots and feature uses
pub async fn long_rest(pool: &SqlitePool, id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    let hp = load_hp(&mut tx, id).await?;
    let max_dice = HitDice::parse(&hp.hit_dice).count;

    sqlx::query(
        "UPDATE characters SET
            current_hp = max_hp,
            temporary_hp = 0,
            current_hit_dice = ?,
            death_saves_success = 0,
            death_saves_failure = 0,
            condition = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?",
    )
    .bind(max_dice)
    .bind(DEFAULT_CONDITION)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE character_spell_slots SET used = 0 WHERE character_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE character_features SET current_uses = uses_per_day
         WHERE character_id = ? AND uses_per_day IS NOT NULL",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!("Long rest applied to character {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (SqlitePool, i64) {
        let url = format!("sqlite://{}", dir.path().join("chars.sqlite").display());
        let pool = crate::db::open_database(&url).await.unwrap();
        let user = crate::db::users::create_user(&pool, "aria", "aria@example.com", "hash")
            .await
            .unwrap();
        (pool, user.id)
    }

    fn new_character(v: serde_json::Value) -> NewCharacter {
        serde_json::from_value(v).unwrap()
    }

    fn seeds() -> Vec<SkillSeed> {
        vec![
            SkillSeed {
                name: "arcana".into(),
                ability: "intelligence".into(),
            },
            SkillSeed {
                name: "stealth".into(),
                ability: "dexterity".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;

        let input = new_character(json!({"name": "Aria", "race": "elf", "class": "wizard"}));
        let id = create_character(&pool, user_id, &input, 6, &seeds()).await.unwrap();
        let sheet = fetch_character(&pool, id).await.unwrap().unwrap();

        assert_eq!(sheet.combat.armor_class, 10);
        assert_eq!(sheet.combat.proficiency_bonus, 2);
        assert_eq!(sheet.combat.hit_points.max, 6);
        assert_eq!(sheet.combat.hit_points.current, 6);
        assert_eq!(sheet.combat.hit_dice, "1d6");
        assert_eq!(sheet.abilities.scores, AbilityScores::default());
        assert_eq!(sheet.skills.len(), 2);
        assert!(sheet.skills.iter().all(|s| !s.proficient));
        assert_eq!(sheet.economy.gold, 0);
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let (pool, _) = setup(&dir).await;
        assert!(fetch_character(&pool, 999).await.unwrap().is_none());
        assert!(access_info(&pool, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_level_recomputes_proficiency() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({"name": "Aria", "race": "elf", "class": "wizard"}));
        let id = create_character(&pool, user_id, &input, 6, &[]).await.unwrap();

        let update: CharacterUpdate = serde_json::from_value(json!({
            "basic_info": {"level": 5},
            "abilities": {"intelligence": 18},
            "economy": {"gold": 25}
        }))
        .unwrap();
        assert!(update_character(&pool, id, &update).await.unwrap());

        let sheet = fetch_character(&pool, id).await.unwrap().unwrap();
        assert_eq!(sheet.basic_info.level, 5);
        assert_eq!(sheet.combat.proficiency_bonus, 3);
        assert_eq!(sheet.abilities.scores.intelligence, 18);
        assert_eq!(sheet.abilities.scores.wisdom, 10);
        assert_eq!(sheet.economy.gold, 25);
        assert_eq!(sheet.basic_info.name, "Aria");
    }

    #[tokio::test]
    async fn test_update_rejects_current_above_max() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({"name": "Aria", "race": "elf", "class": "wizard"}));
        let id = create_character(&pool, user_id, &input, 6, &[]).await.unwrap();

        let update: CharacterUpdate = serde_json::from_value(json!({
            "combat": {"hit_points": {"current": 50}}
        }))
        .unwrap();
        let err = update_character(&pool, id, &update).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let sheet = fetch_character(&pool, id).await.unwrap().unwrap();
        assert_eq!(sheet.combat.hit_points.current, 6);
    }

    #[tokio::test]
    async fn test_damage_and_long_rest() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({
            "name": "Bruni", "race": "dwarf", "class": "fighter",
            "level": 3, "max_hp": 10, "current_hp": 10
        }));
        let id = create_character(&pool, user_id, &input, 10, &[]).await.unwrap();

        let update: CharacterUpdate = serde_json::from_value(json!({
            "combat": {"hit_points": {"temporary": 5}}
        }))
        .unwrap();
        update_character(&pool, id, &update).await.unwrap();
        assert_eq!(apply_damage(&pool, id, 15).await.unwrap(), (0, 0));

        set_spell_slot(&pool, id, SpellSlotInput { level: 1, total: 2, used: None })
            .await
            .unwrap();
        use_spell_slot(&pool, id, 1).await.unwrap();
        short_rest(&pool, id, 2).await.unwrap();

        long_rest(&pool, id).await.unwrap();
        let once = fetch_character(&pool, id).await.unwrap().unwrap();
        long_rest(&pool, id).await.unwrap();
        let twice = fetch_character(&pool, id).await.unwrap().unwrap();

        for sheet in [&once, &twice] {
            assert_eq!(sheet.combat.hit_points.current, 10);
            assert_eq!(sheet.combat.hit_points.temporary, 0);
            assert_eq!(sheet.combat.current_hit_dice, 3);
            assert_eq!(sheet.magic.spell_slots[0].used, 0);
        }
    }

    #[tokio::test]
    async fn test_short_rest_spends_dice() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({
            "name": "Bruni", "race": "dwarf", "class": "fighter",
            "level": 3, "max_hp": 30, "current_hp": 10
        }));
        let id = create_character(&pool, user_id, &input, 10, &[]).await.unwrap();

        let outcome = short_rest(&pool, id, 2).await.unwrap();
        assert_eq!(outcome.dice_used, 2);
        assert_eq!(outcome.current_hp, 20);
        assert_eq!(outcome.remaining_dice, 1);

        let outcome = short_rest(&pool, id, 5).await.unwrap();
        assert_eq!(outcome.dice_used, 1);
        assert_eq!(outcome.remaining_dice, 0);
        assert_eq!(apply_healing(&pool, id, 100).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_child_rows_scoped_to_character() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({"name": "Aria", "race": "elf", "class": "wizard"}));
        let first = create_character(&pool, user_id, &input, 6, &[]).await.unwrap();
        let second = create_character(&pool, user_id, &input, 6, &[]).await.unwrap();

        let item: NewItem = serde_json::from_value(json!({"name": "Rope", "quantity": 1})).unwrap();
        let rope = add_item(&pool, first, &item).await.unwrap();

        let err = remove_item(&pool, second, rope.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = set_item_equipped(&pool, second, rope.id, true).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        set_item_equipped(&pool, first, rope.id, true).await.unwrap();
        let patched = update_item(
            &pool,
            first,
            rope.id,
            &ItemPatch {
                quantity: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(patched.quantity, 3);
        assert!(patched.equipped);
        assert_eq!(patched.item_name, "Rope");
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({"name": "Aria", "race": "elf", "class": "wizard"}));
        let id = create_character(&pool, user_id, &input, 6, &seeds()).await.unwrap();

        assert!(delete_character(&pool, id).await.unwrap());
        assert!(!delete_character(&pool, id).await.unwrap());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM character_skills")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_create_rolls_back_on_failed_skill_insert() {
        let dir = TempDir::new().unwrap();
        let (pool, user_id) = setup(&dir).await;
        let input = new_character(json!({"name": "Aria", "race": "elf", "class": "wizard"}));

        let mut duplicated = seeds();
        duplicated.push(duplicated[0].clone());
        assert!(create_character(&pool, user_id, &input, 6, &duplicated)
            .await
            .is_err());

        for table in ["characters", "character_abilities", "character_skills"] {
            let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(rows, 0, "{} kept rows", table);
        }
        assert!(list_characters(&pool, user_id).await.unwrap().is_empty());
    }
}
