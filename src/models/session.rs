use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_PLAYERS;
use crate::error::{AppError, Result};

/// `game_sessions` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameSession {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub game_system: String,
    pub is_public: bool,
    pub max_players: i64,
    pub creator_id: i64,
    pub created_at: String,
}

/// Session row as listed, with the current head count
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SessionSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub game_system: String,
    pub is_public: bool,
    pub max_players: i64,
    pub creator_id: i64,
    pub created_at: String,
    pub player_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SessionPlayer {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub color: String,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: GameSession,
    pub players: Vec<SessionPlayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerRole {
    Gm,
    Player,
}

impl PlayerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerRole::Gm => "gm",
            PlayerRole::Player => "player",
        }
    }
}

/// `POST /api/sessions`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub game_system: Option<String>,
    pub is_public: Option<bool>,
    pub max_players: Option<i64>,
}

impl NewSession {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput("Session name is required".to_string()));
        }
        if matches!(self.max_players, Some(n) if n < 1) {
            return Err(AppError::InvalidInput(
                "max_players must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_players(&self) -> i64 {
        self.max_players.unwrap_or(DEFAULT_MAX_PLAYERS)
    }
}

/// `POST /api/sessions/:id/join`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinSession {
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_validation() {
        let ok = NewSession {
            name: "Lost Mine".into(),
            description: None,
            game_system: None,
            is_public: None,
            max_players: None,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.max_players(), DEFAULT_MAX_PLAYERS);

        let unnamed = NewSession { name: " ".into(), ..ok.clone() };
        assert!(unnamed.validate().is_err());

        let empty_table = NewSession { max_players: Some(0), ..ok };
        assert!(empty_table.validate().is_err());
    }

    #[test]
    fn test_detail_flattens_session() {
        let detail = SessionDetail {
            session: GameSession {
                id: 3,
                name: "Lost Mine".into(),
                description: None,
                game_system: "dnd5e".into(),
                is_public: true,
                max_players: 5,
                creator_id: 1,
                created_at: "2024-12-01T00:00:00Z".into(),
            },
            players: vec![],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["game_system"], "dnd5e");
        assert!(json["players"].as_array().unwrap().is_empty());
        assert_eq!(PlayerRole::Gm.as_str(), "gm");
    }
}
