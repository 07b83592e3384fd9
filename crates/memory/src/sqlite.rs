//! SQLite store for learning profiles and chat history.
//!
//! Two tables:
//! - `learning_profiles` — one row per student, enums stored as their
//!   serialized names
//! - `chat_turns` — append-only log keyed by session

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use tutorflow_core::context::MasteryLevel;
use tutorflow_core::error::{HistoryError, ProfileError};
use tutorflow_core::history::ChatHistoryStore;
use tutorflow_core::message::{ChatTurn, TurnRole};
use tutorflow_core::profile::{LearningProfile, ProfileProvider};

use crate::samples::sample_profiles;

/// A SQLite-backed profile and history store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests); it is held on a single connection so every query sees the
    /// same data.
    pub async fn new(url: &str) -> Result<Self, HistoryError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .synchronous(SqliteSynchronous::Normal);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS learning_profiles (
                user_id            TEXT PRIMARY KEY NOT NULL,
                name               TEXT,
                grade_level        TEXT,
                teaching_style     TEXT,
                mastery_level      INTEGER,
                emotional_baseline TEXT,
                metadata           TEXT NOT NULL DEFAULT '{}',
                updated_at         TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("learning_profiles table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_turns (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role       TEXT NOT NULL,
                text       TEXT NOT NULL,
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("chat_turns table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_turns_session ON chat_turns(session_id, iid)")
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::Storage(format!("session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Insert or replace a profile.
    pub async fn upsert_profile(&self, profile: &LearningProfile) -> Result<(), HistoryError> {
        self.write_profile(
            profile,
            r#"
            INSERT INTO learning_profiles
                (user_id, name, grade_level, teaching_style, mastery_level, emotional_baseline, metadata, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                grade_level = excluded.grade_level,
                teaching_style = excluded.teaching_style,
                mastery_level = excluded.mastery_level,
                emotional_baseline = excluded.emotional_baseline,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .await
    }

    /// Insert the sample students. Profiles already stored are left as they are.
    pub async fn seed_samples(&self) -> Result<(), HistoryError> {
        for profile in sample_profiles() {
            self.write_profile(
                &profile,
                r#"
                INSERT INTO learning_profiles
                    (user_id, name, grade_level, teaching_style, mastery_level, emotional_baseline, metadata, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(user_id) DO NOTHING
                "#,
            )
            .await?;
        }
        Ok(())
    }

    async fn write_profile(&self, profile: &LearningProfile, sql: &str) -> Result<(), HistoryError> {
        let metadata = serde_json::to_string(&profile.metadata)
            .map_err(|e| HistoryError::Storage(format!("metadata: {e}")))?;

        sqlx::query(sql)
            .bind(&profile.user_id)
            .bind(&profile.name)
            .bind(&profile.grade_level)
            .bind(profile.teaching_style.map(|s| s.as_str()))
            .bind(profile.mastery_level.map(|m| i64::from(m.value())))
            .bind(profile.emotional_baseline.map(|e| e.as_str()))
            .bind(metadata)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::Storage(format!("write profile failed: {e}")))?;

        Ok(())
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<LearningProfile, ProfileError> {
        let column = |name: &str, e: sqlx::Error| ProfileError::Unavailable(format!("{name} column: {e}"));

        let user_id: String = row.try_get("user_id").map_err(|e| column("user_id", e))?;
        let name: Option<String> = row.try_get("name").map_err(|e| column("name", e))?;
        let grade_level: Option<String> = row
            .try_get("grade_level")
            .map_err(|e| column("grade_level", e))?;
        let style: Option<String> = row
            .try_get("teaching_style")
            .map_err(|e| column("teaching_style", e))?;
        let mastery: Option<i64> = row
            .try_get("mastery_level")
            .map_err(|e| column("mastery_level", e))?;
        let baseline: Option<String> = row
            .try_get("emotional_baseline")
            .map_err(|e| column("emotional_baseline", e))?;
        let metadata_json: String = row.try_get("metadata").map_err(|e| column("metadata", e))?;

        Ok(LearningProfile {
            user_id,
            name,
            grade_level,
            // Unrecognized stored values read as "no preference".
            teaching_style: style.and_then(|s| parse_enum(&s)),
            mastery_level: mastery
                .and_then(|m| u8::try_from(m).ok())
                .and_then(MasteryLevel::new),
            emotional_baseline: baseline.and_then(|s| parse_enum(&s)),
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        })
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(name: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
}

#[async_trait]
impl ProfileProvider for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn profile(&self, user_id: &str) -> Result<LearningProfile, ProfileError> {
        let row = sqlx::query("SELECT * FROM learning_profiles WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ProfileError::Unavailable(format!("GET profile: {e}")))?;

        match row {
            Some(ref r) => Self::row_to_profile(r),
            None => Err(ProfileError::NotFound(user_id.to_string())),
        }
    }
}

#[async_trait]
impl ChatHistoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, session_id: &str, turns: &[ChatTurn]) -> Result<(), HistoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HistoryError::Storage(format!("BEGIN failed: {e}")))?;

        for turn in turns {
            sqlx::query(
                "INSERT INTO chat_turns (session_id, role, text, timestamp) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(session_id)
            .bind(match turn.role {
                TurnRole::Student => "student",
                TurnRole::System => "system",
            })
            .bind(&turn.text)
            .bind(turn.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| HistoryError::Storage(format!("INSERT turn failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| HistoryError::Storage(format!("COMMIT failed: {e}")))?;
        Ok(())
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ChatTurn>, HistoryError> {
        let rows = sqlx::query(
            r#"
            SELECT role, text, timestamp FROM (
                SELECT iid, role, text, timestamp FROM chat_turns
                WHERE session_id = ?1
                ORDER BY iid DESC
                LIMIT ?2
            ) ORDER BY iid ASC
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("SELECT turns failed: {e}")))?;

        rows.iter()
            .map(|row| {
                let role: String = row
                    .try_get("role")
                    .map_err(|e| HistoryError::Storage(format!("role column: {e}")))?;
                let text: String = row
                    .try_get("text")
                    .map_err(|e| HistoryError::Storage(format!("text column: {e}")))?;
                let timestamp: String = row
                    .try_get("timestamp")
                    .map_err(|e| HistoryError::Storage(format!("timestamp column: {e}")))?;

                Ok(ChatTurn {
                    role: if role == "student" {
                        TurnRole::Student
                    } else {
                        TurnRole::System
                    },
                    text,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorflow_core::context::{EmotionalState, TeachingStyle};

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn seeded_profiles_read_back() {
        let store = test_store().await;
        store.seed_samples().await.unwrap();

        let bob = store.profile("student789").await.unwrap();
        assert_eq!(bob.name.as_deref(), Some("Bob"));
        assert_eq!(bob.teaching_style, Some(TeachingStyle::Socratic));
        assert_eq!(bob.emotional_baseline, Some(EmotionalState::Confused));
        assert_eq!(bob.mastery_level.map(|m| m.value()), Some(4));
    }

    #[tokio::test]
    async fn reseeding_keeps_edited_profile() {
        let store = test_store().await;
        store.seed_samples().await.unwrap();

        let mut bob = store.profile("student789").await.unwrap();
        bob.teaching_style = Some(TeachingStyle::Direct);
        bob.mastery_level = MasteryLevel::new(8);
        store.upsert_profile(&bob).await.unwrap();

        store.seed_samples().await.unwrap();
        let stored = store.profile("student789").await.unwrap();
        assert_eq!(stored.teaching_style, Some(TeachingStyle::Direct));
        assert_eq!(stored.mastery_level.map(|m| m.value()), Some(8));
    }

    #[tokio::test]
    async fn missing_profile_not_found() {
        let store = test_store().await;
        assert!(matches!(
            store.profile("ghost").await,
            Err(ProfileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn upsert_overwrites() {
        let store = test_store().await;
        let mut profile = LearningProfile::default_for("u1");
        store.upsert_profile(&profile).await.unwrap();
        assert!(store.profile("u1").await.unwrap().teaching_style.is_none());

        profile.teaching_style = Some(TeachingStyle::Flipped);
        profile.mastery_level = MasteryLevel::new(9);
        store.upsert_profile(&profile).await.unwrap();

        let stored = store.profile("u1").await.unwrap();
        assert_eq!(stored.teaching_style, Some(TeachingStyle::Flipped));
        assert_eq!(stored.mastery_level.map(|m| m.value()), Some(9));
    }

    #[tokio::test]
    async fn history_window_is_oldest_first() {
        let store = test_store().await;
        store
            .append(
                "s1",
                &[
                    ChatTurn::student("a"),
                    ChatTurn::system("b"),
                    ChatTurn::student("c"),
                ],
            )
            .await
            .unwrap();
        store.append("s2", &[ChatTurn::student("x")]).await.unwrap();

        let turns = store.recent("s1", 2).await.unwrap();
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
        assert_eq!(turns[0].role, TurnRole::System);
        assert_eq!(turns[1].role, TurnRole::Student);
    }
}
