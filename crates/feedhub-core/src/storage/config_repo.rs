use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::Result;

/// Scheduler settings as persisted in the shared store
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StoredSchedulerConfig {
    /// Interval text in `<n><unit>` form; validated by the reader
    pub interval: String,
    pub workers: i64,
    pub updated_at: DateTime<Utc>,
}

/// Repository for the single-row scheduler configuration
pub struct ConfigRepository<'a> {
    db: &'a Database,
}

impl<'a> ConfigRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Read the stored configuration, if one was ever written
    pub async fn get(&self) -> Result<Option<StoredSchedulerConfig>> {
        let row: Option<StoredSchedulerConfig> = sqlx::query_as(
            r#"
            SELECT interval, workers, updated_at
            FROM scheduler_config
            WHERE id = 1
            "#,
        )
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row)
    }

    /// Insert or replace the stored configuration
    pub async fn set(&self, interval: &str, workers: usize) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_config (id, interval, workers, updated_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                interval = excluded.interval,
                workers = excluded.workers,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(interval)
        .bind(workers as i64)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}
