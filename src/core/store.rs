//! Session persistence using SQLite
//!
//! Each session row owns the patient profile columns; its turns live in an
//! ordered side table. All writes for one request go through a single
//! transaction so a crash mid-request never leaves a half-applied update.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::conversation::{ConversationMemory, Role, Turn};
use crate::core::intake::PatientProfile;

/// One session's persisted state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub profile: PatientProfile,
    pub memory: ConversationMemory,
}

#[derive(Debug, thiserror::Error)]
#[error("session store error: {0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError(e.to_string())
    }
}

/// Keyed persistence for session state.
///
/// `commit` applies the profile and any newly appended turns atomically;
/// `clear` removes the whole session, profile and turns together.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    async fn create(&self, session_id: &str) -> Result<(), StoreError>;

    async fn commit(
        &self,
        session_id: &str,
        profile: &PatientProfile,
        new_turns: &[Turn],
    ) -> Result<(), StoreError>;

    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;
}

/// SQLite-backed store
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Create a new store with the given SQLite database path
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        // Create parent directories if they don't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(StoreError::from)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                name TEXT,
                age INTEGER,
                weight TEXT,
                height TEXT,
                blood_group TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_turns_session
            ON turns(session_id, position)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<(
            Option<String>,
            Option<i64>,
            Option<String>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            r#"
            SELECT name, age, weight, height, blood_group
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((name, age, weight, height, blood_group)) = row else {
            return Ok(None);
        };

        let profile = PatientProfile {
            name,
            age: age.map(|a| a as u32),
            weight,
            height,
            blood_group,
        };

        let turn_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT role, content
            FROM turns
            WHERE session_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let turns = turn_rows
            .into_iter()
            .map(|(role, content)| Turn {
                role: match role.as_str() {
                    "bot" => Role::Bot,
                    _ => Role::User,
                },
                content,
            })
            .collect();

        Ok(Some(Session {
            id: session_id.to_string(),
            profile,
            memory: ConversationMemory::from_turns(turns),
        }))
    }

    async fn create(&self, session_id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sessions (id, created_at, updated_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn commit(
        &self,
        session_id: &str,
        profile: &PatientProfile,
        new_turns: &[Turn],
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET name = ?, age = ?, weight = ?, height = ?, blood_group = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.name)
        .bind(profile.age.map(|a| a as i64))
        .bind(&profile.weight)
        .bind(&profile.height)
        .bind(&profile.blood_group)
        .bind(&now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if !new_turns.is_empty() {
            let (next_position,): (i64,) = sqlx::query_as(
                r#"
                SELECT COALESCE(MAX(position) + 1, 0)
                FROM turns
                WHERE session_id = ?
                "#,
            )
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;

            for (offset, turn) in new_turns.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO turns (session_id, position, role, content, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(session_id)
                .bind(next_position + offset as i64)
                .bind(turn.role.as_str())
                .bind(&turn.content)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
