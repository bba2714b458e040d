/// Minimum username length accepted at registration and profile update
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Character level bounds
pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 20;

/// Ability score bounds
pub const MIN_ABILITY_SCORE: i64 = 1;
pub const MAX_ABILITY_SCORE: i64 = 30;

/// Ability score used for every omitted ability at creation
pub const DEFAULT_ABILITY_SCORE: i64 = 10;

pub const DEFAULT_ARMOR_CLASS: i64 = 10;
pub const DEFAULT_SPEED: i64 = 30;
pub const DEFAULT_PASSIVE_PERCEPTION: i64 = 10;

/// Condition a character returns to after a long rest
pub const DEFAULT_CONDITION: &str = "normal";

/// Hit die used for classes missing from the hit-die table
pub const DEFAULT_HIT_DIE: i64 = 8;

/// Largest hit die a class may declare, and the cap on a hit dice pool
pub const MAX_HIT_DIE: i64 = 20;
pub const MAX_HIT_DICE_COUNT: i64 = MAX_LEVEL;

/// Highest spell level with its own slot row
pub const MAX_SPELL_LEVEL: i64 = 9;

/// Session defaults
pub const DEFAULT_MAX_PLAYERS: i64 = 10;
pub const DEFAULT_GAME_SYSTEM: &str = "generic";
pub const DEFAULT_PLAYER_COLOR: &str = "#000000";

/// Token defaults
pub const DEFAULT_TOKEN_SIZE: i64 = 50;

/// Names of the editable content documents
pub const CONFIG_NAMES: [&str; 6] = ["races", "classes", "skills", "spells", "items", "feats"];

/// Proficiency kinds accepted by the proficiency endpoint
pub const PROFICIENCY_KINDS: [&str; 6] = ["weapon", "armor", "tool", "skill", "save", "language"];

/// The six ability names, in sheet order
pub const ABILITY_NAMES: [&str; 6] = [
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
];

// =============================================================================
// Error Messages
// =============================================================================

pub const ERR_MISSING_TOKEN: &str = "Access token required";

pub const ERR_INVALID_TOKEN: &str = "Invalid token";

pub const ERR_EXPIRED_TOKEN: &str = "Token expired";

pub const ERR_UNKNOWN_USER: &str = "User no longer exists";

pub const ERR_BAD_CREDENTIALS: &str = "Invalid email or password";

pub const ERR_DUPLICATE_USER: &str = "User with this email or username already exists";
