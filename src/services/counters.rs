use chrono::Utc;

use crate::{db::DbPool, error::AppError};

/// Persisted integer sequences. The increment is a single upsert statement
/// executed by the database, so concurrent callers can never observe or
/// return the same value; the application never reads, adds one, and writes
/// back.
#[derive(Clone)]
pub struct CounterStore {
    db: DbPool,
}

impl CounterStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Current value, creating the row at 1 on first use. Never increments.
    pub async fn get(&self, key: &str) -> Result<i64, AppError> {
        sqlx::query(
            "INSERT INTO counters (key, value, last_updated) VALUES (?, 1, ?) \
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        let value = sqlx::query_scalar("SELECT value FROM counters WHERE key = ?")
            .bind(key)
            .fetch_one(&self.db)
            .await?;
        Ok(value)
    }

    /// Atomically bumps the counter and returns the new value. An absent row
    /// is created already incremented (create-at-1 then bump, fused into one
    /// statement).
    pub async fn increment_and_get(&self, key: &str) -> Result<i64, AppError> {
        let value = sqlx::query_scalar(
            "INSERT INTO counters (key, value, last_updated) VALUES (?, 2, ?) \
             ON CONFLICT(key) DO UPDATE \
             SET value = value + 1, last_updated = excluded.last_updated \
             RETURNING value",
        )
        .bind(key)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;
        Ok(value)
    }
}
