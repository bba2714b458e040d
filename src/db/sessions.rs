use sqlx::{SqliteConnection, SqlitePool};

use crate::constants::{DEFAULT_GAME_SYSTEM, DEFAULT_PLAYER_COLOR};
use crate::error::{AppError, Result};
use crate::models::session::{
    GameSession, NewSession, PlayerRole, SessionDetail, SessionPlayer, SessionSummary,
};

const SESSION_COLUMNS: &str =
    "id, name, description, game_system, is_public, max_players, creator_id, created_at";

/// Public sessions plus every session the user created or joined
pub async fn list_sessions(pool: &SqlitePool, user_id: i64) -> Result<Vec<SessionSummary>> {
    let rows = sqlx::query_as::<_, SessionSummary>(
        "SELECT s.id, s.name, s.description, s.game_system, s.is_public, s.max_players,
                s.creator_id, s.created_at,
                (SELECT COUNT(*) FROM session_players p WHERE p.session_id = s.id) AS player_count
         FROM game_sessions s
         WHERE s.is_public = 1
            OR s.creator_id = ?1
            OR EXISTS (SELECT 1 FROM session_players p
                       WHERE p.session_id = s.id AND p.user_id = ?1)
         ORDER BY s.created_at DESC, s.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn load_session(conn: &mut SqliteConnection, id: i64) -> Result<Option<GameSession>> {
    let session = sqlx::query_as::<_, GameSession>(&format!(
        "SELECT {} FROM game_sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(session)
}

async fn load_players(conn: &mut SqliteConnection, id: i64) -> Result<Vec<SessionPlayer>> {
    let players = sqlx::query_as::<_, SessionPlayer>(
        "SELECT p.user_id, u.username, p.role, p.color, p.joined_at
         FROM session_players p JOIN users u ON u.id = p.user_id
         WHERE p.session_id = ?
         ORDER BY p.joined_at, p.user_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(players)
}

pub async fn find_session(pool: &SqlitePool, id: i64) -> Result<Option<GameSession>> {
    let mut conn = pool.acquire().await?;
    load_session(&mut conn, id).await
}

pub async fn get_session(pool: &SqlitePool, id: i64) -> Result<Option<SessionDetail>> {
    let mut tx = pool.begin().await?;
    let Some(session) = load_session(&mut tx, id).await? else {
        return Ok(None);
    };
    let players = load_players(&mut tx, id).await?;
    tx.commit().await?;
    Ok(Some(SessionDetail { session, players }))
}

/// Create a session; the creator joins it as game master
pub async fn create_session(pool: &SqlitePool, creator_id: i64, input: &NewSession) -> Result<SessionDetail> {
    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, GameSession>(&format!(
        "INSERT INTO game_sessions (name, description, game_system, is_public, max_players, creator_id)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {}",
        SESSION_COLUMNS
    ))
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(input.game_system.as_deref().unwrap_or(DEFAULT_GAME_SYSTEM))
    .bind(input.is_public.unwrap_or(true))
    .bind(input.max_players())
    .bind(creator_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO session_players (session_id, user_id, role, color) VALUES (?, ?, ?, ?)")
        .bind(session.id)
        .bind(creator_id)
        .bind(PlayerRole::Gm.as_str())
        .bind(DEFAULT_PLAYER_COLOR)
        .execute(&mut *tx)
        .await?;

    let players = load_players(&mut tx, session.id).await?;
    tx.commit().await?;

    tracing::info!("User {} created session {}", creator_id, session.id);
    Ok(SessionDetail { session, players })
}

/// Join a session as a player
///
/// Joining twice is a no-op. A full session rejects newcomers with 400.
pub async fn join_session(
    pool: &SqlitePool,
    id: i64,
    user_id: i64,
    color: Option<&str>,
) -> Result<SessionDetail> {
    let mut tx = pool.begin().await?;

    let session = load_session(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Session"))?;

    let already: Option<i64> = sqlx::query_scalar(
        "SELECT user_id FROM session_players WHERE session_id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if already.is_none() {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM session_players WHERE session_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if count >= session.max_players {
            return Err(AppError::InvalidInput("Session is full".to_string()));
        }

        sqlx::query(
            "INSERT INTO session_players (session_id, user_id, role, color) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(PlayerRole::Player.as_str())
        .bind(color.unwrap_or(DEFAULT_PLAYER_COLOR))
        .execute(&mut *tx)
        .await?;

        tracing::info!("User {} joined session {}", user_id, id);
    }

    let players = load_players(&mut tx, id).await?;
    tx.commit().await?;
    Ok(SessionDetail { session, players })
}

/// Delete a session the user created; players and tokens cascade
pub async fn delete_session(pool: &SqlitePool, id: i64, user_id: i64) -> Result<()> {
    let session = find_session(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Session"))?;
    if session.creator_id != user_id {
        tracing::warn!("User {} tried to delete session {} they did not create", user_id, id);
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM game_sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    tracing::info!("Deleted session {}", id);
    Ok(())
}

pub async fn count_sessions(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM game_sessions")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::create_user;
    use tempfile::TempDir;

    async fn setup(dir: &TempDir) -> (SqlitePool, i64, i64) {
        let url = format!("sqlite://{}", dir.path().join("sessions.sqlite").display());
        let pool = crate::db::open_database(&url).await.unwrap();
        let gm = create_user(&pool, "gm_user", "gm@example.com", "h").await.unwrap();
        let player = create_user(&pool, "player", "p@example.com", "h").await.unwrap();
        (pool, gm.id, player.id)
    }

    fn new_session(max_players: Option<i64>) -> NewSession {
        NewSession {
            name: "Lost Mine".into(),
            description: None,
            game_system: None,
            is_public: None,
            max_players,
        }
    }

    #[tokio::test]
    async fn test_creator_joins_as_gm() {
        let dir = TempDir::new().unwrap();
        let (pool, gm, _) = setup(&dir).await;

        let detail = create_session(&pool, gm, &new_session(None)).await.unwrap();
        assert_eq!(detail.players.len(), 1);
        assert_eq!(detail.players[0].role, "gm");
        assert_eq!(detail.session.game_system, DEFAULT_GAME_SYSTEM);
        assert_eq!(count_sessions(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_bounded() {
        let dir = TempDir::new().unwrap();
        let (pool, gm, player) = setup(&dir).await;
        let third = create_user(&pool, "third", "t@example.com", "h").await.unwrap();

        let id = create_session(&pool, gm, &new_session(Some(2))).await.unwrap().session.id;

        join_session(&pool, id, player, None).await.unwrap();
        let detail = join_session(&pool, id, player, None).await.unwrap();
        assert_eq!(detail.players.len(), 2);

        let err = join_session(&pool, id, third.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = join_session(&pool, 999, player, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_only_creator_deletes() {
        let dir = TempDir::new().unwrap();
        let (pool, gm, player) = setup(&dir).await;
        let id = create_session(&pool, gm, &new_session(None)).await.unwrap().session.id;

        assert!(matches!(
            delete_session(&pool, id, player).await,
            Err(AppError::Forbidden)
        ));
        delete_session(&pool, id, gm).await.unwrap();
        assert!(get_session(&pool, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_private_sessions_hidden_from_strangers() {
        let dir = TempDir::new().unwrap();
        let (pool, gm, player) = setup(&dir).await;
        let private = NewSession {
            is_public: Some(false),
            ..new_session(None)
        };
        create_session(&pool, gm, &private).await.unwrap();

        assert_eq!(list_sessions(&pool, gm).await.unwrap().len(), 1);
        assert!(list_sessions(&pool, player).await.unwrap().is_empty());
    }
}
