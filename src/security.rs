use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::constants::{ERR_EXPIRED_TOKEN, ERR_INVALID_TOKEN};
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header for every token we issue
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password with Argon2id and a random salt, returning the PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash is treated as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Argon2 is deliberately slow; keep it off the async workers
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?)
}

// =============================================================================
// Bearer Tokens (JWT, HS256)
// =============================================================================

/// Claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    /// Issued-at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Unauthorized(ERR_EXPIRED_TOKEN.to_string()),
            TokenError::Malformed | TokenError::BadSignature => {
                AppError::Unauthorized(ERR_INVALID_TOKEN.to_string())
            }
        }
    }
}

fn sign(data: &str, secret: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InvalidInput("Invalid signing key".to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Issue a token for a user, valid for `ttl_secs` from `now`
pub fn issue_token(user_id: i64, username: &str, secret: &str, now: i64, ttl_secs: i64) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    let header = URL_SAFE_NO_PAD.encode(JWT_HEADER);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{}.{}", header, payload);
    let signature = URL_SAFE_NO_PAD.encode(sign(&signing_input, secret)?);

    Ok(format!("{}.{}", signing_input, signature))
}

/// Verify signature and expiry, returning the claims
///
/// The signature comparison is constant time (`Mac::verify_slice`).
pub fn verify_token(token: &str, secret: &str, now: i64) -> std::result::Result<Claims, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
    if header_json.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
        tracing::warn!("Rejected token with unexpected algorithm");
        return Err(TokenError::Malformed);
    }

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        tracing::error!("Failed to create HMAC instance");
        TokenError::BadSignature
    })?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| TokenError::BadSignature)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let claims: Claims =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;

    if claims.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret-key";
    const NOW: i64 = 1_733_788_800;

    // =========================================================================
    // Password Tests
    // =========================================================================

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("password124", &hash));
    }

    #[test]
    fn test_password_hash_is_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    // =========================================================================
    // Token Tests
    // =========================================================================

    #[test]
    fn test_issue_and_verify_token() {
        let token = issue_token(42, "aria", SECRET, NOW, 3600).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = verify_token(&token, SECRET, NOW + 10).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "aria");
        assert_eq!(claims.exp, NOW + 3600);
    }

    #[test]
    fn test_expired_token() {
        let token = issue_token(1, "u", SECRET, NOW, 60).unwrap();
        assert_eq!(verify_token(&token, SECRET, NOW + 60), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let token = issue_token(1, "u", SECRET, NOW, 60).unwrap();
        assert_eq!(
            verify_token(&token, "another-secret-key", NOW),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let token = issue_token(1, "u", SECRET, NOW, 60).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = Claims {
            sub: 2,
            username: "u".into(),
            iat: NOW,
            exp: NOW + 60,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(verify_token(&forged, SECRET, NOW), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(verify_token("", SECRET, NOW), Err(TokenError::Malformed));
        assert_eq!(verify_token("a.b", SECRET, NOW), Err(TokenError::Malformed));
        assert_eq!(verify_token("a.b.c.d", SECRET, NOW), Err(TokenError::Malformed));
        assert_eq!(verify_token("!!.??.**", SECRET, NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let claims = Claims {
            sub: 1,
            username: "u".into(),
            iat: NOW,
            exp: NOW + 60,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let token = format!("{}.{}.", header, payload);
        assert_eq!(verify_token(&token, SECRET, NOW), Err(TokenError::Malformed));
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer xyz"), Some("xyz"));
        assert_eq!(bearer_token("Basic Zm9v"), None);
        assert_eq!(bearer_token("Bearer   "), None);
    }
}
