use sqlx::SqlitePool;

use crate::constants::ERR_DUPLICATE_USER;
use crate::error::{AppError, Result};
use crate::models::{User, UserRecord};

const USER_COLUMNS: &str = "id, username, email, avatar, created_at";

/// Map a UNIQUE violation on username/email to 409
fn map_unique(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(ERR_DUPLICATE_USER.to_string())
        }
        _ => AppError::Database(err),
    }
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_record_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRecord>> {
    let record = sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, email, password_hash, avatar, created_at
         FROM users WHERE email = ? COLLATE NOCASE",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

/// Is the username or email taken by someone other than `except_id`?
pub async fn is_taken(
    pool: &SqlitePool,
    username: Option<&str>,
    email: Option<&str>,
    except_id: Option<i64>,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users
         WHERE (username = ?1 OR email = ?2 COLLATE NOCASE)
           AND (?3 IS NULL OR id <> ?3)",
    )
    .bind(username)
    .bind(email)
    .bind(except_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(email.trim())
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(map_unique)?;

    tracing::info!("Created user {} ({})", user.id, user.username);
    Ok(user)
}

/// Profile fields to change; the password arrives already hashed
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<String>,
}

pub async fn update_profile(pool: &SqlitePool, id: i64, changes: ProfileChanges) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            username = COALESCE(?, username),
            email = COALESCE(?, email),
            password_hash = COALESCE(?, password_hash),
            avatar = COALESCE(?, avatar),
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(changes.username)
    .bind(changes.email)
    .bind(changes.password_hash)
    .bind(changes.avatar)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(map_unique)?
    .ok_or_else(|| AppError::not_found("User"))?;

    Ok(user)
}

/// Every account, newest first
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Create the development account when the users table is empty
pub async fn seed_test_user(pool: &SqlitePool) -> Result<()> {
    if count_users(pool).await? > 0 {
        return Ok(());
    }

    let hash = crate::security::hash_password_blocking("password123".to_string()).await?;
    create_user(pool, "testuser", "test@test.com", &hash).await?;
    tracing::info!("Seeded test user testuser / test@test.com");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_pool(dir: &TempDir) -> SqlitePool {
        let url = format!("sqlite://{}", dir.path().join("users.sqlite").display());
        crate::db::open_database(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;

        let user = create_user(&pool, "aria", "aria@example.com", "hash").await.unwrap();
        assert_eq!(find_by_id(&pool, user.id).await.unwrap(), Some(user.clone()));

        let record = find_record_by_email(&pool, "ARIA@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.password_hash, "hash");
        assert_eq!(count_users(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_users_newest_first() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;

        let first = create_user(&pool, "aria", "aria@example.com", "hash").await.unwrap();
        let second = create_user(&pool, "brom", "brom@example.com", "hash").await.unwrap();

        let users = list_users(&pool).await.unwrap();
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_duplicate_user_is_conflict() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;

        create_user(&pool, "aria", "aria@example.com", "hash").await.unwrap();
        let err = create_user(&pool, "aria", "other@example.com", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(is_taken(&pool, None, Some("aria@example.com"), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_profile_keeps_unset_fields() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir).await;

        let user = create_user(&pool, "aria", "aria@example.com", "hash").await.unwrap();
        let updated = update_profile(
            &pool,
            user.id,
            ProfileChanges {
                avatar: Some("/a.png".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.username, "aria");
        assert_eq!(updated.avatar.as_deref(), Some("/a.png"));
    }
}
