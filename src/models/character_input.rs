//! Request payloads for character creation, partial updates and child rows.

use serde::Deserialize;

use crate::constants::*;
use crate::error::{AppError, Result};
use crate::models::character::AbilityScores;
use crate::rules::HitDice;

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::InvalidInput(msg.into())
}

fn check_range(field: &str, value: Option<i64>, min: i64, max: i64) -> Result<()> {
    match value {
        Some(v) if v < min || v > max => Err(invalid(format!(
            "{} must be between {} and {}",
            field, min, max
        ))),
        _ => Ok(()),
    }
}

fn check_non_negative(field: &str, value: Option<i64>) -> Result<()> {
    match value {
        Some(v) if v < 0 => Err(invalid(format!("{} must not be negative", field))),
        _ => Ok(()),
    }
}

fn check_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    Ok(())
}

fn check_ability_name(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(a) if !ABILITY_NAMES.contains(&a.trim().to_ascii_lowercase().as_str()) => Err(
            invalid(format!("{} must be one of: {}", field, ABILITY_NAMES.join(", "))),
        ),
        _ => Ok(()),
    }
}

fn check_hit_dice(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(dice) if HitDice::parse_bounded(dice).is_none() => Err(invalid(format!(
            "{} must look like \"3d8\" with at most {} dice of up to {} faces",
            field, MAX_HIT_DICE_COUNT, MAX_HIT_DIE
        ))),
        _ => Ok(()),
    }
}

/// Ability scores where every omitted score falls back to 10
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AbilitiesInput {
    pub strength: Option<i64>,
    pub dexterity: Option<i64>,
    pub constitution: Option<i64>,
    pub intelligence: Option<i64>,
    pub wisdom: Option<i64>,
    pub charisma: Option<i64>,
}

impl AbilitiesInput {
    fn fields(&self) -> [(&'static str, Option<i64>); 6] {
        [
            ("strength", self.strength),
            ("dexterity", self.dexterity),
            ("constitution", self.constitution),
            ("intelligence", self.intelligence),
            ("wisdom", self.wisdom),
            ("charisma", self.charisma),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.fields() {
            check_range(name, value, MIN_ABILITY_SCORE, MAX_ABILITY_SCORE)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// Apply the present scores on top of `base`
    pub fn merged_onto(&self, base: AbilityScores) -> AbilityScores {
        AbilityScores {
            strength: self.strength.unwrap_or(base.strength),
            dexterity: self.dexterity.unwrap_or(base.dexterity),
            constitution: self.constitution.unwrap_or(base.constitution),
            intelligence: self.intelligence.unwrap_or(base.intelligence),
            wisdom: self.wisdom.unwrap_or(base.wisdom),
            charisma: self.charisma.unwrap_or(base.charisma),
        }
    }
}

/// Currency, every coin optional
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EconomyInput {
    pub copper: Option<i64>,
    pub silver: Option<i64>,
    pub electrum: Option<i64>,
    pub gold: Option<i64>,
    pub platinum: Option<i64>,
}

impl EconomyInput {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("copper", self.copper)?;
        check_non_negative("silver", self.silver)?;
        check_non_negative("electrum", self.electrum)?;
        check_non_negative("gold", self.gold)?;
        check_non_negative("platinum", self.platinum)
    }
}

/// `POST /api/characters`
#[derive(Debug, Clone, Deserialize)]
pub struct NewCharacter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default, rename = "class")]
    pub class_name: String,
    pub level: Option<i64>,
    pub background: Option<String>,
    pub alignment: Option<String>,
    pub subrace: Option<String>,
    pub subclass: Option<String>,
    pub abilities: Option<AbilitiesInput>,
    pub max_hp: Option<i64>,
    pub current_hp: Option<i64>,
    pub armor_class: Option<i64>,
    pub speed: Option<i64>,
    pub initiative: Option<i64>,
    pub passive_perception: Option<i64>,
    pub hit_dice: Option<String>,
    pub spellcasting_ability: Option<String>,
    #[serde(flatten)]
    pub economy: EconomyInput,
    pub is_public: Option<bool>,
}

impl NewCharacter {
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("race", &self.race),
            ("class", &self.class_name),
        ]
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| *k)
        .collect();

        if !missing.is_empty() {
            return Err(invalid(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        check_range("level", self.level, MIN_LEVEL, MAX_LEVEL)?;
        if let Some(abilities) = &self.abilities {
            abilities.validate()?;
        }
        check_range("max_hp", self.max_hp, 1, i64::from(i32::MAX))?;
        check_non_negative("current_hp", self.current_hp)?;
        check_non_negative("armor_class", self.armor_class)?;
        check_non_negative("speed", self.speed)?;
        check_ability_name("spellcasting_ability", self.spellcasting_ability.as_deref())?;
        check_hit_dice("hit_dice", self.hit_dice.as_deref())?;
        self.economy.validate()?;

        if let (Some(current), Some(max)) = (self.current_hp, self.max_hp) {
            if current > max {
                return Err(invalid("current_hp cannot exceed max_hp"));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Partial update
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicInfoPatch {
    pub name: Option<String>,
    pub race: Option<String>,
    pub subrace: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub subclass: Option<String>,
    pub level: Option<i64>,
    pub experience: Option<i64>,
    pub background: Option<String>,
    pub alignment: Option<String>,
    pub spellcasting_ability: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HitPointsPatch {
    pub current: Option<i64>,
    pub max: Option<i64>,
    pub temporary: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeathSavesPatch {
    pub successes: Option<i64>,
    pub failures: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CombatPatch {
    pub hit_points: Option<HitPointsPatch>,
    pub armor_class: Option<i64>,
    pub speed: Option<i64>,
    pub initiative: Option<i64>,
    pub proficiency_bonus: Option<i64>,
    pub passive_perception: Option<i64>,
    pub hit_dice: Option<String>,
    pub current_hit_dice: Option<i64>,
    pub death_saves: Option<DeathSavesPatch>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptionPatch {
    pub portrait_url: Option<String>,
    pub appearance: Option<String>,
    pub personality_traits: Option<String>,
    pub ideals: Option<String>,
    pub bonds: Option<String>,
    pub flaws: Option<String>,
    pub backstory: Option<String>,
    pub notes: Option<String>,
}

/// `PUT /api/characters/:id`; sections and their fields are all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterUpdate {
    pub basic_info: Option<BasicInfoPatch>,
    pub combat: Option<CombatPatch>,
    pub abilities: Option<AbilitiesInput>,
    pub economy: Option<EconomyInput>,
    pub description: Option<DescriptionPatch>,
    pub is_public: Option<bool>,
}

impl CharacterUpdate {
    /// Field-level checks that do not need the stored row
    pub fn validate(&self) -> Result<()> {
        if let Some(info) = &self.basic_info {
            for (field, value) in [
                ("name", &info.name),
                ("race", &info.race),
                ("class", &info.class_name),
            ] {
                if let Some(v) = value {
                    check_required(field, v)?;
                }
            }
            check_range("level", info.level, MIN_LEVEL, MAX_LEVEL)?;
            check_non_negative("experience", info.experience)?;
            check_ability_name("spellcasting_ability", info.spellcasting_ability.as_deref())?;
        }

        if let Some(combat) = &self.combat {
            if let Some(hp) = combat.hit_points {
                check_range("hit_points.max", hp.max, 1, i64::from(i32::MAX))?;
                check_non_negative("hit_points.current", hp.current)?;
                check_non_negative("hit_points.temporary", hp.temporary)?;
            }
            check_non_negative("armor_class", combat.armor_class)?;
            check_non_negative("speed", combat.speed)?;
            check_non_negative("proficiency_bonus", combat.proficiency_bonus)?;
            check_non_negative("passive_perception", combat.passive_perception)?;
            check_range("current_hit_dice", combat.current_hit_dice, 0, MAX_HIT_DICE_COUNT)?;
            if let Some(saves) = combat.death_saves {
                check_range("death_saves.successes", saves.successes, 0, 3)?;
                check_range("death_saves.failures", saves.failures, 0, 3)?;
            }
            check_hit_dice("hit_dice", combat.hit_dice.as_deref())?;
        }

        if let Some(abilities) = &self.abilities {
            abilities.validate()?;
        }
        if let Some(economy) = &self.economy {
            economy.validate()?;
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.basic_info.is_none()
            && self.combat.is_none()
            && self.abilities.is_none()
            && self.economy.is_none()
            && self.description.is_none()
            && self.is_public.is_none()
    }
}

// =============================================================================
// Child rows
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    #[serde(default, alias = "name")]
    pub item_name: String,
    #[serde(alias = "type")]
    pub item_type: Option<String>,
    pub quantity: Option<i64>,
    pub weight: Option<f64>,
    pub description: Option<String>,
    #[serde(default)]
    pub equipped: bool,
}

impl NewItem {
    pub fn validate(&self) -> Result<()> {
        check_required("name", &self.item_name)?;
        check_range("quantity", self.quantity, 1, i64::from(i32::MAX))?;
        if matches!(self.weight, Some(w) if w < 0.0 || !w.is_finite()) {
            return Err(invalid("weight must be a non-negative number"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(alias = "name")]
    pub item_name: Option<String>,
    #[serde(alias = "type")]
    pub item_type: Option<String>,
    pub quantity: Option<i64>,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub equipped: Option<bool>,
}

impl ItemPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.item_name {
            check_required("name", name)?;
        }
        check_range("quantity", self.quantity, 0, i64::from(i32::MAX))?;
        if matches!(self.weight, Some(w) if w < 0.0 || !w.is_finite()) {
            return Err(invalid("weight must be a non-negative number"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWeapon {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub damage_dice: String,
    pub damage_type: Option<String>,
    pub ability: Option<String>,
    pub attack_bonus: Option<i64>,
    #[serde(alias = "weapon_range")]
    pub range: Option<String>,
    pub properties: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub equipped: bool,
}

impl NewWeapon {
    pub fn validate(&self) -> Result<()> {
        check_required("name", &self.name)?;
        check_required("damage_dice", &self.damage_dice)?;
        check_ability_name("ability", self.ability.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSpell {
    #[serde(default, alias = "name")]
    pub spell_name: String,
    pub level: Option<i64>,
    pub school: Option<String>,
    #[serde(default)]
    pub prepared: bool,
    #[serde(default)]
    pub concentration: bool,
    #[serde(default)]
    pub ritual: bool,
    pub description: Option<String>,
}

impl NewSpell {
    pub fn validate(&self) -> Result<()> {
        check_required("spell_name", &self.spell_name)?;
        check_range("level", self.level, 0, MAX_SPELL_LEVEL)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeature {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub uses_per_day: Option<i64>,
    pub current_uses: Option<i64>,
    pub is_active: Option<bool>,
}

impl NewFeature {
    pub fn validate(&self) -> Result<()> {
        check_required("name", &self.name)?;
        check_non_negative("uses_per_day", self.uses_per_day)?;
        check_non_negative("current_uses", self.current_uses)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProficiency {
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

impl NewProficiency {
    pub fn validate(&self) -> Result<()> {
        check_required("name", &self.name)?;
        let kind = self.kind.trim().to_ascii_lowercase();
        if !PROFICIENCY_KINDS.contains(&kind.as_str()) {
            return Err(invalid(format!(
                "kind must be one of: {}",
                PROFICIENCY_KINDS.join(", ")
            )));
        }
        Ok(())
    }
}

/// `PUT /api/characters/:id/skills/:skillId`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SkillPatch {
    pub proficient: Option<bool>,
    pub expertise: Option<bool>,
}

/// `PUT /api/characters/:id/spell-slots`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpellSlotInput {
    pub level: i64,
    pub total: i64,
    pub used: Option<i64>,
}

impl SpellSlotInput {
    pub fn validate(&self) -> Result<()> {
        check_range("level", Some(self.level), 1, MAX_SPELL_LEVEL)?;
        check_non_negative("total", Some(self.total))?;
        check_range("used", self.used, 0, self.total)
    }
}

/// Body for equip/unequip
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ItemRef {
    #[serde(rename = "itemId", alias = "item_id")]
    pub item_id: i64,
}

/// Body for prepare/unprepare
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpellRef {
    #[serde(rename = "spellId", alias = "spell_id")]
    pub spell_id: i64,
}

/// Body for spending a spell slot
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SlotRef {
    pub level: i64,
}

// =============================================================================
// Combat actions
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DamageRequest {
    pub damage: Option<i64>,
    #[serde(rename = "damageType", alias = "damage_type")]
    pub damage_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HealRequest {
    pub healing: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ShortRestRequest {
    #[serde(default, alias = "hitDiceUsed")]
    pub hit_dice_used: i64,
}

/// Damage and healing amounts must be present and strictly positive
pub fn require_positive(field: &str, value: Option<i64>) -> Result<i64> {
    match value {
        Some(v) if v > 0 => Ok(v),
        _ => Err(invalid(format!("{} must be a positive number", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse<T: serde::de::DeserializeOwned>(v: serde_json::Value) -> T {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_new_character_minimal() {
        let c: NewCharacter = parse(json!({"name": "Aria", "race": "elf", "class": "wizard"}));
        assert!(c.validate().is_ok());
        assert_eq!(c.class_name, "wizard");
        assert!(c.level.is_none());
        assert!(c.economy.gold.is_none());
    }

    #[test]
    fn test_new_character_missing_fields_listed() {
        let c: NewCharacter = parse(json!({"name": "Aria"}));
        match c.validate() {
            Err(AppError::InvalidInput(msg)) => {
                assert!(msg.contains("race"));
                assert!(msg.contains("class"));
                assert!(!msg.contains("name"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_character_currency_is_flat() {
        let c: NewCharacter = parse(json!({
            "name": "Aria", "race": "elf", "class": "wizard", "gold": 15
        }));
        assert_eq!(c.economy.gold, Some(15));
    }

    #[test]
    fn test_new_character_rejects_out_of_range() {
        let c: NewCharacter = parse(json!({
            "name": "A", "race": "elf", "class": "wizard", "level": 21
        }));
        assert!(c.validate().is_err());

        let c: NewCharacter = parse(json!({
            "name": "A", "race": "elf", "class": "wizard", "abilities": {"strength": 0}
        }));
        assert!(c.validate().is_err());

        let c: NewCharacter = parse(json!({
            "name": "A", "race": "elf", "class": "wizard", "max_hp": 5, "current_hp": 8
        }));
        assert!(c.validate().is_err());

        let c: NewCharacter = parse(json!({
            "name": "A", "race": "elf", "class": "wizard", "hit_dice": "lots"
        }));
        assert!(c.validate().is_err());

        let c: NewCharacter = parse(json!({
            "name": "A", "race": "elf", "class": "wizard", "hit_dice": "2d6"
        }));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_abilities_merge() {
        let input = AbilitiesInput {
            strength: Some(16),
            ..Default::default()
        };
        let merged = input.merged_onto(AbilityScores::default());
        assert_eq!(merged.strength, 16);
        assert_eq!(merged.wisdom, 10);
        assert!(!input.is_empty());
        assert!(AbilitiesInput::default().is_empty());
    }

    #[test]
    fn test_update_validation() {
        let update: CharacterUpdate = parse(json!({
            "combat": {"hit_points": {"current": -1}}
        }));
        assert!(update.validate().is_err());

        let update: CharacterUpdate = parse(json!({
            "combat": {"hit_dice": "4d10", "death_saves": {"failures": 2}}
        }));
        assert!(update.validate().is_ok());

        let update: CharacterUpdate = parse(json!({"combat": {"hit_dice": "lots"}}));
        assert!(update.validate().is_err());

        let update: CharacterUpdate =
            parse(json!({"combat": {"hit_dice": "9223372036854775807d8"}}));
        assert!(update.validate().is_err());

        let update: CharacterUpdate = parse(json!({"combat": {"current_hit_dice": 500}}));
        assert!(update.validate().is_err());

        let update: CharacterUpdate = parse(json!({"basic_info": {"name": "  "}}));
        assert!(update.validate().is_err());

        assert!(CharacterUpdate::default().is_empty());
    }

    #[test]
    fn test_item_aliases() {
        let item: NewItem = parse(json!({"name": "Rope", "type": "gear", "quantity": 2}));
        assert_eq!(item.item_name, "Rope");
        assert_eq!(item.item_type.as_deref(), Some("gear"));
        assert!(item.validate().is_ok());

        let bad: NewItem = parse(json!({"name": "Rope", "weight": -1.0}));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_proficiency_kind_checked() {
        let ok: NewProficiency = parse(json!({"type": "tool", "name": "thieves' tools"}));
        assert!(ok.validate().is_ok());
        let bad: NewProficiency = parse(json!({"kind": "vehicle", "name": "cart"}));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_spell_slot_input() {
        assert!(SpellSlotInput { level: 1, total: 4, used: Some(2) }.validate().is_ok());
        assert!(SpellSlotInput { level: 0, total: 4, used: None }.validate().is_err());
        assert!(SpellSlotInput { level: 3, total: 2, used: Some(3) }.validate().is_err());
    }

    #[test]
    fn test_refs_accept_camel_case() {
        let r: ItemRef = parse(json!({"itemId": 5}));
        assert_eq!(r.item_id, 5);
        let s: SpellRef = parse(json!({"spell_id": 6}));
        assert_eq!(s.spell_id, 6);
    }

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("damage", Some(3)).unwrap(), 3);
        assert!(require_positive("damage", Some(0)).is_err());
        assert!(require_positive("damage", Some(-2)).is_err());
        assert!(require_positive("damage", None).is_err());
    }
}
