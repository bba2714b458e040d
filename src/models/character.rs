//! Character aggregate: the core row, its child rows, and the sectioned
//! document served to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::{self, HitDice};

/// Core `characters` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CharacterRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub race: String,
    pub subrace: Option<String>,
    #[sqlx(rename = "class")]
    pub class_name: String,
    pub subclass: Option<String>,
    pub level: i64,
    pub experience: i64,
    pub background: String,
    pub alignment: String,

    pub max_hp: i64,
    pub current_hp: i64,
    pub temporary_hp: i64,
    pub armor_class: i64,
    pub speed: i64,
    pub initiative: i64,
    pub proficiency_bonus: i64,
    pub passive_perception: i64,
    pub hit_dice: String,
    pub current_hit_dice: i64,
    pub death_saves_success: i64,
    pub death_saves_failure: i64,
    pub condition: String,

    pub copper: i64,
    pub silver: i64,
    pub electrum: i64,
    pub gold: i64,
    pub platinum: i64,

    pub spellcasting_ability: Option<String>,

    pub portrait_url: Option<String>,
    pub appearance: Option<String>,
    pub personality_traits: Option<String>,
    pub ideals: Option<String>,
    pub bonds: Option<String>,
    pub flaws: Option<String>,
    pub backstory: Option<String>,
    pub notes: Option<String>,

    pub is_public: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AbilityScores {
    pub strength: i64,
    pub dexterity: i64,
    pub constitution: i64,
    pub intelligence: i64,
    pub wisdom: i64,
    pub charisma: i64,
}

impl Default for AbilityScores {
    fn default() -> Self {
        let d = crate::constants::DEFAULT_ABILITY_SCORE;
        Self {
            strength: d,
            dexterity: d,
            constitution: d,
            intelligence: d,
            wisdom: d,
            charisma: d,
        }
    }
}

impl AbilityScores {
    /// Score by ability name; `None` for anything that is not one of the six
    pub fn get(&self, ability: &str) -> Option<i64> {
        match ability.trim().to_ascii_lowercase().as_str() {
            "strength" | "str" => Some(self.strength),
            "dexterity" | "dex" => Some(self.dexterity),
            "constitution" | "con" => Some(self.constitution),
            "intelligence" | "int" => Some(self.intelligence),
            "wisdom" | "wis" => Some(self.wisdom),
            "charisma" | "cha" => Some(self.charisma),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> AbilityModifiers {
        AbilityModifiers {
            strength: rules::ability_modifier(self.strength),
            dexterity: rules::ability_modifier(self.dexterity),
            constitution: rules::ability_modifier(self.constitution),
            intelligence: rules::ability_modifier(self.intelligence),
            wisdom: rules::ability_modifier(self.wisdom),
            charisma: rules::ability_modifier(self.charisma),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbilityModifiers {
    pub strength: i64,
    pub dexterity: i64,
    pub constitution: i64,
    pub intelligence: i64,
    pub wisdom: i64,
    pub charisma: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SkillRow {
    pub id: i64,
    pub name: String,
    pub ability: String,
    pub proficient: bool,
    pub expertise: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feature {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub source: String,
    pub uses_per_day: Option<i64>,
    pub current_uses: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Proficiency {
    pub id: i64,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub item_name: String,
    pub item_type: String,
    pub quantity: i64,
    pub weight: f64,
    pub description: String,
    pub equipped: bool,
    /// Content-store definition for `item_name`, when one exists
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Weapon {
    pub id: i64,
    pub name: String,
    pub damage_dice: String,
    pub damage_type: String,
    pub ability: String,
    pub attack_bonus: i64,
    #[serde(rename = "range")]
    pub weapon_range: Option<String>,
    pub properties: Option<String>,
    pub description: Option<String>,
    pub equipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Spell {
    pub id: i64,
    pub spell_name: String,
    pub level: i64,
    pub school: String,
    pub prepared: bool,
    pub concentration: bool,
    pub ritual: bool,
    pub description: String,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spell_data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SpellSlot {
    pub level: i64,
    pub total: i64,
    pub used: i64,
}

impl SpellSlot {
    pub fn remaining(&self) -> i64 {
        (self.total - self.used).max(0)
    }
}

/// One line of the character list
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CharacterSummary {
    pub id: i64,
    pub name: String,
    pub race: String,
    #[sqlx(rename = "class")]
    #[serde(rename = "class")]
    pub class_name: String,
    pub level: i64,
    pub current_hp: i64,
    pub max_hp: i64,
    pub armor_class: i64,
    pub portrait_url: Option<String>,
    pub is_public: bool,
    pub updated_at: String,
}

// =============================================================================
// Sheet document
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BasicInfo {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub race: String,
    pub subrace: Option<String>,
    #[serde(rename = "class")]
    pub class_name: String,
    pub subclass: Option<String>,
    pub level: i64,
    pub experience: i64,
    pub background: String,
    pub alignment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbilitiesSection {
    #[serde(flatten)]
    pub scores: AbilityScores,
    pub modifiers: AbilityModifiers,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct HitPoints {
    pub current: i64,
    pub max: i64,
    pub temporary: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeathSaves {
    pub successes: i64,
    pub failures: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombatSection {
    pub hit_points: HitPoints,
    pub armor_class: i64,
    pub speed: i64,
    pub initiative: i64,
    pub proficiency_bonus: i64,
    pub passive_perception: i64,
    pub hit_dice: String,
    pub current_hit_dice: i64,
    pub max_hit_dice: i64,
    pub death_saves: DeathSaves,
    pub condition: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillView {
    pub id: i64,
    pub name: String,
    pub ability: String,
    pub proficient: bool,
    pub expertise: bool,
    pub bonus: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Economy {
    pub copper: i64,
    pub silver: i64,
    pub electrum: i64,
    pub gold: i64,
    pub platinum: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MagicSection {
    pub spellcasting_ability: Option<String>,
    pub spell_save_dc: Option<i64>,
    pub spell_attack_bonus: Option<i64>,
    pub spells: Vec<Spell>,
    pub spell_slots: Vec<SpellSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Description {
    pub portrait_url: Option<String>,
    pub appearance: Option<String>,
    pub personality_traits: Option<String>,
    pub ideals: Option<String>,
    pub bonds: Option<String>,
    pub flaws: Option<String>,
    pub backstory: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub is_public: bool,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// The full character document
#[derive(Debug, Clone, Serialize)]
pub struct CharacterSheet {
    pub basic_info: BasicInfo,
    pub abilities: AbilitiesSection,
    pub combat: CombatSection,
    pub skills: Vec<SkillView>,
    pub features: Vec<Feature>,
    pub proficiencies: Vec<Proficiency>,
    pub economy: Economy,
    pub inventory: Vec<InventoryItem>,
    pub weapons: Vec<Weapon>,
    pub magic: MagicSection,
    pub description: Description,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_data: Option<Value>,
}

/// Everything read for one character, before it is shaped into a sheet
#[derive(Debug, Clone)]
pub struct CharacterParts {
    pub core: CharacterRow,
    pub abilities: AbilityScores,
    pub skills: Vec<SkillRow>,
    pub features: Vec<Feature>,
    pub proficiencies: Vec<Proficiency>,
    pub inventory: Vec<InventoryItem>,
    pub weapons: Vec<Weapon>,
    pub spells: Vec<Spell>,
    pub spell_slots: Vec<SpellSlot>,
}

impl CharacterSheet {
    /// Shape the rows into sections and fill in derived numbers
    pub fn assemble(parts: CharacterParts) -> Self {
        let CharacterParts {
            core,
            abilities,
            skills,
            features,
            proficiencies,
            inventory,
            weapons,
            spells,
            spell_slots,
        } = parts;

        let pb = core.proficiency_bonus;

        let skills = skills
            .into_iter()
            .map(|s| {
                let score = abilities
                    .get(&s.ability)
                    .unwrap_or(crate::constants::DEFAULT_ABILITY_SCORE);
                SkillView {
                    bonus: rules::skill_bonus(score, pb, s.proficient, s.expertise),
                    id: s.id,
                    name: s.name,
                    ability: s.ability,
                    proficient: s.proficient,
                    expertise: s.expertise,
                }
            })
            .collect();

        let casting_score = core
            .spellcasting_ability
            .as_deref()
            .and_then(|a| abilities.get(a));

        let max_hit_dice = HitDice::parse(&core.hit_dice).count;

        CharacterSheet {
            basic_info: BasicInfo {
                id: core.id,
                user_id: core.user_id,
                name: core.name,
                race: core.race,
                subrace: core.subrace,
                class_name: core.class_name,
                subclass: core.subclass,
                level: core.level,
                experience: core.experience,
                background: core.background,
                alignment: core.alignment,
            },
            abilities: AbilitiesSection {
                modifiers: abilities.modifiers(),
                scores: abilities,
            },
            combat: CombatSection {
                hit_points: HitPoints {
                    current: core.current_hp,
                    max: core.max_hp,
                    temporary: core.temporary_hp,
                },
                armor_class: core.armor_class,
                speed: core.speed,
                initiative: core.initiative,
                proficiency_bonus: pb,
                passive_perception: core.passive_perception,
                hit_dice: core.hit_dice,
                current_hit_dice: core.current_hit_dice,
                max_hit_dice,
                death_saves: DeathSaves {
                    successes: core.death_saves_success,
                    failures: core.death_saves_failure,
                },
                condition: core.condition,
            },
            skills,
            features,
            proficiencies,
            economy: Economy {
                copper: core.copper,
                silver: core.silver,
                electrum: core.electrum,
                gold: core.gold,
                platinum: core.platinum,
            },
            inventory,
            weapons,
            magic: MagicSection {
                spell_save_dc: casting_score.map(|s| rules::spell_save_dc(pb, s)),
                spell_attack_bonus: casting_score.map(|s| rules::spell_attack_bonus(pb, s)),
                spellcasting_ability: core.spellcasting_ability,
                spells,
                spell_slots,
            },
            description: Description {
                portrait_url: core.portrait_url,
                appearance: core.appearance,
                personality_traits: core.personality_traits,
                ideals: core.ideals,
                bonds: core.bonds,
                flaws: core.flaws,
                backstory: core.backstory,
                notes: core.notes,
            },
            meta: Meta {
                is_public: core.is_public,
                user_id: core.user_id,
                created_at: core.created_at,
                updated_at: core.updated_at,
            },
            race_data: None,
            class_data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_core() -> CharacterRow {
        CharacterRow {
            id: 1,
            user_id: 9,
            name: "Aria".into(),
            race: "elf".into(),
            subrace: None,
            class_name: "wizard".into(),
            subclass: None,
            level: 5,
            experience: 6500,
            background: "sage".into(),
            alignment: "neutral good".into(),
            max_hp: 27,
            current_hp: 20,
            temporary_hp: 3,
            armor_class: 12,
            speed: 30,
            initiative: 2,
            proficiency_bonus: 3,
            passive_perception: 13,
            hit_dice: "5d6".into(),
            current_hit_dice: 2,
            death_saves_success: 0,
            death_saves_failure: 0,
            condition: "normal".into(),
            copper: 1,
            silver: 2,
            electrum: 0,
            gold: 40,
            platinum: 0,
            spellcasting_ability: Some("intelligence".into()),
            portrait_url: None,
            appearance: None,
            personality_traits: None,
            ideals: None,
            bonds: None,
            flaws: None,
            backstory: None,
            notes: None,
            is_public: false,
            created_at: "2024-12-01T00:00:00Z".into(),
            updated_at: "2024-12-01T00:00:00Z".into(),
        }
    }

    fn sample_parts() -> CharacterParts {
        CharacterParts {
            core: sample_core(),
            abilities: AbilityScores {
                intelligence: 18,
                dexterity: 14,
                ..AbilityScores::default()
            },
            skills: vec![
                SkillRow {
                    id: 1,
                    name: "arcana".into(),
                    ability: "intelligence".into(),
                    proficient: true,
                    expertise: false,
                },
                SkillRow {
                    id: 2,
                    name: "stealth".into(),
                    ability: "dexterity".into(),
                    proficient: false,
                    expertise: false,
                },
            ],
            features: vec![],
            proficiencies: vec![],
            inventory: vec![],
            weapons: vec![],
            spells: vec![],
            spell_slots: vec![SpellSlot {
                level: 1,
                total: 4,
                used: 1,
            }],
        }
    }

    #[test]
    fn test_ability_lookup_by_name_and_abbreviation() {
        let scores = AbilityScores {
            wisdom: 15,
            ..AbilityScores::default()
        };
        assert_eq!(scores.get("wisdom"), Some(15));
        assert_eq!(scores.get("WIS"), Some(15));
        assert_eq!(scores.get("luck"), None);
        assert_eq!(scores.modifiers().wisdom, 2);
    }

    #[test]
    fn test_assemble_derives_skill_bonuses_and_spellcasting() {
        let sheet = CharacterSheet::assemble(sample_parts());

        assert_eq!(sheet.skills[0].bonus, 4 + 3);
        assert_eq!(sheet.skills[1].bonus, 2);
        assert_eq!(sheet.magic.spell_save_dc, Some(8 + 3 + 4));
        assert_eq!(sheet.magic.spell_attack_bonus, Some(3 + 4));
        assert_eq!(sheet.combat.max_hit_dice, 5);
        assert_eq!(sheet.magic.spell_slots[0].remaining(), 3);
    }

    #[test]
    fn test_sheet_sections_serialize() {
        let sheet = CharacterSheet::assemble(sample_parts());
        let json = serde_json::to_value(&sheet).unwrap();

        assert_eq!(json["basic_info"]["class"], "wizard");
        assert_eq!(json["abilities"]["intelligence"], 18);
        assert_eq!(json["abilities"]["modifiers"]["intelligence"], 4);
        assert_eq!(json["combat"]["hit_points"]["temporary"], 3);
        assert_eq!(json["economy"]["gold"], 40);
        assert_eq!(json["meta"]["user_id"], 9);
        assert!(json.get("race_data").is_none());
    }
}
