//! Derived character values and combat arithmetic.
//!
//! Everything here is pure so the database layer can load a row, call into
//! these functions and write the result back inside one transaction.

use std::fmt;

use crate::constants::{DEFAULT_HIT_DIE, MAX_HIT_DICE_COUNT, MAX_HIT_DIE};

/// Ability modifier: `floor((score - 10) / 2)`
pub fn ability_modifier(score: i64) -> i64 {
    (score - 10).div_euclid(2)
}

/// Proficiency bonus for a character level: `floor((level - 1) / 4) + 2`
pub fn proficiency_bonus(level: i64) -> i64 {
    (level.max(1) - 1) / 4 + 2
}

/// Hit die faces for a class name (case-insensitive), 8 when unknown
pub fn hit_die_for_class(class: &str) -> i64 {
    match class.trim().to_ascii_lowercase().as_str() {
        "barbarian" => 12,
        "fighter" | "paladin" | "ranger" => 10,
        "rogue" | "bard" | "cleric" | "druid" | "monk" | "warlock" => 8,
        "wizard" | "sorcerer" => 6,
        _ => DEFAULT_HIT_DIE,
    }
}

/// Maximum hit points for a freshly created character.
///
/// First level takes the full die, each further level the rounded-up average
/// (`floor(die / 2) + 1`); constitution applies per level. Never below 1.
pub fn default_max_hp(level: i64, hit_die: i64, constitution: i64) -> i64 {
    let con = ability_modifier(constitution);
    let first = hit_die.saturating_add(con);
    let per_level = (hit_die / 2).saturating_add(1).saturating_add(con);
    let total = first.saturating_add(per_level.saturating_mul(level.max(1) - 1));
    total.max(1)
}

/// Skill check bonus from the governing ability score
pub fn skill_bonus(ability_score: i64, proficiency: i64, proficient: bool, expertise: bool) -> i64 {
    let base = ability_modifier(ability_score);
    match (proficient, expertise) {
        (_, true) => base + proficiency * 2,
        (true, false) => base + proficiency,
        (false, false) => base,
    }
}

/// Spell save DC: `8 + proficiency + casting modifier`
pub fn spell_save_dc(proficiency: i64, casting_score: i64) -> i64 {
    8 + proficiency + ability_modifier(casting_score)
}

/// Spell attack bonus: `proficiency + casting modifier`
pub fn spell_attack_bonus(proficiency: i64, casting_score: i64) -> i64 {
    proficiency + ability_modifier(casting_score)
}

/// A pool of hit dice, stored as `"<count>d<faces>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitDice {
    pub count: i64,
    pub faces: i64,
}

impl HitDice {
    pub fn new(count: i64, faces: i64) -> Self {
        Self { count, faces }
    }

    /// Parse `"3d8"`; anything unparsable falls back to `1d8`
    pub fn parse(s: &str) -> Self {
        let fallback = Self::new(1, DEFAULT_HIT_DIE);
        let Some((count, faces)) = s.trim().split_once(|c: char| c == 'd' || c == 'D') else {
            return fallback;
        };
        match (count.trim().parse::<i64>(), faces.trim().parse::<i64>()) {
            (Ok(count), Ok(faces)) if count > 0 && faces > 0 => Self::new(count, faces),
            _ => fallback,
        }
    }

    /// Strict form of [`HitDice::parse`]: `None` unless the text is exactly
    /// `<count>d<faces>` with both parts in range
    pub fn parse_bounded(s: &str) -> Option<Self> {
        let parsed = Self::parse(s);
        let in_range = (1..=MAX_HIT_DICE_COUNT).contains(&parsed.count)
            && (1..=MAX_HIT_DIE).contains(&parsed.faces);
        (in_range && parsed.to_string() == s.trim().to_ascii_lowercase()).then_some(parsed)
    }
}

impl fmt::Display for HitDice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.faces)
    }
}

/// Apply damage: temporary hit points absorb first, the rest comes off
/// current hit points, floored at zero. Returns `(current, temporary)`.
pub fn apply_damage(current_hp: i64, temporary_hp: i64, damage: i64) -> (i64, i64) {
    let temporary_hp = temporary_hp.max(0);
    if damage <= temporary_hp {
        return (current_hp, temporary_hp - damage);
    }
    let remaining = damage - temporary_hp;
    ((current_hp - remaining).max(0), 0)
}

/// Apply healing, capped at maximum hit points
pub fn apply_healing(current_hp: i64, max_hp: i64, healing: i64) -> i64 {
    current_hp.saturating_add(healing).min(max_hp)
}

/// Outcome of spending hit dice on a short rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRestOutcome {
    pub dice_used: i64,
    pub hp_recovered: i64,
    pub current_hp: i64,
    pub remaining_dice: i64,
}

/// Spend up to `requested` hit dice. Each die heals its average rounded up
/// (`ceil(faces / 2)`); no dice are rolled.
pub fn short_rest(
    current_hp: i64,
    max_hp: i64,
    remaining_dice: i64,
    faces: i64,
    requested: i64,
) -> ShortRestOutcome {
    let dice_used = requested.max(0).min(remaining_dice.max(0));
    let per_die = faces / 2 + faces % 2;
    let hp_recovered = dice_used.saturating_mul(per_die);
    let new_hp = if hp_recovered > 0 {
        apply_healing(current_hp, max_hp, hp_recovered)
    } else {
        current_hp
    };

    ShortRestOutcome {
        dice_used,
        hp_recovered: new_hp - current_hp,
        current_hp: new_hp,
        remaining_dice: remaining_dice - dice_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ability_modifier() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(11), 0);
        assert_eq!(ability_modifier(12), 1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(20), 5);
        assert_eq!(ability_modifier(30), 10);
    }

    #[test]
    fn test_proficiency_bonus_by_level() {
        let expected = [
            (1, 2),
            (4, 2),
            (5, 3),
            (8, 3),
            (9, 4),
            (12, 4),
            (13, 5),
            (17, 6),
            (20, 6),
        ];
        for (level, bonus) in expected {
            assert_eq!(proficiency_bonus(level), bonus, "level {}", level);
        }
    }

    #[test]
    fn test_hit_die_table() {
        assert_eq!(hit_die_for_class("barbarian"), 12);
        assert_eq!(hit_die_for_class("Fighter"), 10);
        assert_eq!(hit_die_for_class("WIZARD"), 6);
        assert_eq!(hit_die_for_class("cleric"), 8);
        assert_eq!(hit_die_for_class("artificer"), 8);
    }

    #[test]
    fn test_default_max_hp() {
        // Wizard, level 1, constitution 10
        assert_eq!(default_max_hp(1, 6, 10), 6);
        // Fighter, level 3, constitution 14: 10+2 + 2*(5+1+2)
        assert_eq!(default_max_hp(3, 10, 14), 28);
        // Never below one
        assert_eq!(default_max_hp(1, 6, 1), 1);
    }

    #[test]
    fn test_default_max_hp_saturates() {
        assert_eq!(default_max_hp(2, i64::MAX, 10), i64::MAX);
        assert_eq!(default_max_hp(20, i64::MAX, 30), i64::MAX);
    }

    #[test]
    fn test_skill_bonus() {
        assert_eq!(skill_bonus(14, 2, false, false), 2);
        assert_eq!(skill_bonus(14, 2, true, false), 4);
        assert_eq!(skill_bonus(14, 2, true, true), 6);
    }

    #[test]
    fn test_spellcasting_numbers() {
        assert_eq!(spell_save_dc(2, 16), 13);
        assert_eq!(spell_attack_bonus(3, 18), 7);
    }

    #[test]
    fn test_hit_dice_parse_and_display() {
        assert_eq!(HitDice::parse("3d8"), HitDice::new(3, 8));
        assert_eq!(HitDice::parse(" 2D12 "), HitDice::new(2, 12));
        assert_eq!(HitDice::parse("garbage"), HitDice::new(1, 8));
        assert_eq!(HitDice::parse("0d6"), HitDice::new(1, 8));
        assert_eq!(HitDice::new(5, 10).to_string(), "5d10");
    }

    #[test]
    fn test_hit_dice_parse_bounded() {
        assert_eq!(HitDice::parse_bounded("4d10"), Some(HitDice::new(4, 10)));
        assert_eq!(HitDice::parse_bounded(" 20D20 "), Some(HitDice::new(20, 20)));
        assert_eq!(HitDice::parse_bounded("lots"), None);
        assert_eq!(HitDice::parse_bounded("21d8"), None);
        assert_eq!(HitDice::parse_bounded("1d21"), None);
        assert_eq!(HitDice::parse_bounded("9223372036854775807d8"), None);
    }

    #[test]
    fn test_damage_absorbed_by_temporary() {
        assert_eq!(apply_damage(10, 5, 3), (10, 2));
        assert_eq!(apply_damage(10, 5, 5), (10, 0));
    }

    #[test]
    fn test_damage_overflows_temporary() {
        assert_eq!(apply_damage(10, 5, 8), (7, 0));
        assert_eq!(apply_damage(10, 5, 15), (0, 0));
        assert_eq!(apply_damage(10, 0, 100), (0, 0));
    }

    #[test]
    fn test_damage_property_holds_for_small_inputs() {
        for hp in 0..15 {
            for temp in 0..8 {
                for d in 0..30 {
                    let got = apply_damage(hp, temp, d);
                    let want = if d <= temp {
                        (hp, temp - d)
                    } else {
                        ((hp - (d - temp)).max(0), 0)
                    };
                    assert_eq!(got, want, "hp={} temp={} d={}", hp, temp, d);
                }
            }
        }
    }

    #[test]
    fn test_healing_capped() {
        assert_eq!(apply_healing(3, 10, 4), 7);
        assert_eq!(apply_healing(8, 10, 4), 10);
        assert_eq!(apply_healing(0, 10, 0), 0);
    }

    #[test]
    fn test_healing_huge_amount_reaches_max() {
        assert_eq!(apply_healing(5, 10, i64::MAX), 10);
        assert_eq!(apply_healing(i64::MAX - 1, i64::MAX, i64::MAX), i64::MAX);
    }

    #[test]
    fn test_short_rest_uses_average_rounded_up() {
        let outcome = short_rest(2, 30, 3, 8, 2);
        assert_eq!(outcome.dice_used, 2);
        assert_eq!(outcome.hp_recovered, 8);
        assert_eq!(outcome.current_hp, 10);
        assert_eq!(outcome.remaining_dice, 1);

        // d5-style odd faces round up
        assert_eq!(short_rest(0, 30, 1, 5, 1).hp_recovered, 3);
    }

    #[test]
    fn test_short_rest_limited_by_remaining_dice_and_max_hp() {
        let outcome = short_rest(9, 10, 1, 10, 4);
        assert_eq!(outcome.dice_used, 1);
        assert_eq!(outcome.current_hp, 10);
        assert_eq!(outcome.hp_recovered, 1);
        assert_eq!(outcome.remaining_dice, 0);

        let none = short_rest(5, 10, 0, 8, 3);
        assert_eq!(none.dice_used, 0);
        assert_eq!(none.current_hp, 5);
    }

    #[test]
    fn test_short_rest_huge_pool_saturates() {
        let outcome = short_rest(1, 10, i64::MAX, i64::MAX, i64::MAX);
        assert_eq!(outcome.dice_used, i64::MAX);
        assert_eq!(outcome.current_hp, 10);
        assert_eq!(outcome.hp_recovered, 9);
        assert_eq!(outcome.remaining_dice, 0);
    }
}
