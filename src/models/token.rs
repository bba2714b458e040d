use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A map token placed in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Token {
    pub id: i64,
    pub session_id: i64,
    pub name: String,
    pub image_url: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub rotation: i64,
    pub is_visible: bool,
    pub is_locked: bool,
    pub owner_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewToken {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

impl NewToken {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.image_url.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Token name and image_url are required".to_string(),
            ));
        }
        check_size(self.width, self.height)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPatch {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub rotation: Option<i64>,
    pub is_visible: Option<bool>,
    pub is_locked: Option<bool>,
}

impl TokenPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err(AppError::InvalidInput("Token name cannot be empty".to_string()));
        }
        check_size(self.width, self.height)
    }
}

fn check_size(width: Option<i64>, height: Option<i64>) -> Result<()> {
    if matches!(width, Some(w) if w <= 0) || matches!(height, Some(h) if h <= 0) {
        return Err(AppError::InvalidInput(
            "Token width and height must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_token_requires_name_and_image() {
        let t: NewToken = serde_json::from_value(json!({"name": "Goblin"})).unwrap();
        assert!(t.validate().is_err());

        let t: NewToken =
            serde_json::from_value(json!({"name": "Goblin", "image_url": "/g.png"})).unwrap();
        assert!(t.validate().is_ok());
        assert!(t.x.is_none());
    }

    #[test]
    fn test_patch_rejects_zero_size() {
        let p: TokenPatch = serde_json::from_value(json!({"width": 0})).unwrap();
        assert!(p.validate().is_err());
        let p: TokenPatch = serde_json::from_value(json!({"x": 120, "y": 40})).unwrap();
        assert!(p.validate().is_ok());
    }
}
