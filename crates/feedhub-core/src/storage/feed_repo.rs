use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{Feed, NewFeed};
use crate::{Error, Result};

/// Repository for feed CRUD operations
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            url: row.url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a new feed. Names are unique.
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(&new_feed.name)
        .bind(&new_feed.url)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::FeedExists(new_feed.name.clone()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::FeedNotFound(id.to_string()))
    }

    /// Find a feed by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, updated_at
            FROM feeds
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Find a feed by its unique name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, updated_at
            FROM feeds
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// List feeds, newest first. A limit of 0 returns every feed.
    pub async fn list(&self, limit: i64) -> Result<Vec<Feed>> {
        if limit < 0 {
            return Err(Error::InvalidLimit(limit));
        }

        // SQLite treats a negative LIMIT as "no limit"
        let sql_limit = if limit == 0 { -1 } else { limit };

        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, updated_at
            FROM feeds
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(sql_limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Feeds whose last fetch cycle is oldest
    pub async fn list_least_recently_updated(&self, limit: usize) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, updated_at
            FROM feeds
            ORDER BY updated_at ASC, created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Record the end of a fetch cycle
    pub async fn update_timestamp(&self, id: Uuid, updated_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(updated_at)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Delete a feed and all its articles
    pub async fn delete_by_name(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM feeds WHERE name = ?")
            .bind(name)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::FeedNotFound(name.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_feed(name: &str) -> NewFeed {
        NewFeed {
            name: name.to_string(),
            url: format!("https://{}.example/rss", name),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);

        let feed = repo.create(&new_feed("tech")).await.unwrap();
        assert_eq!(feed.name, "tech");
        assert_eq!(feed.url, "https://tech.example/rss");

        let by_name = repo.find_by_name("tech").await.unwrap().unwrap();
        assert_eq!(by_name.id, feed.id);
        assert!(repo.find_by_name("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);

        repo.create(&new_feed("tech")).await.unwrap();
        let result = repo.create(&new_feed("tech")).await;

        assert!(matches!(result, Err(Error::FeedExists(name)) if name == "tech"));
        assert_eq!(repo.list(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_limits() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);

        for name in ["a", "b", "c"] {
            repo.create(&new_feed(name)).await.unwrap();
        }

        assert_eq!(repo.list(0).await.unwrap().len(), 3);
        assert_eq!(repo.list(2).await.unwrap().len(), 2);
        assert!(matches!(repo.list(-1).await, Err(Error::InvalidLimit(-1))));
    }

    #[tokio::test]
    async fn test_least_recently_updated_first() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);

        let a = repo.create(&new_feed("a")).await.unwrap();
        let b = repo.create(&new_feed("b")).await.unwrap();
        let c = repo.create(&new_feed("c")).await.unwrap();

        let t = |h| Utc.with_ymd_and_hms(2030, 1, 1, h, 0, 0).unwrap();
        repo.update_timestamp(a.id, t(3)).await.unwrap();
        repo.update_timestamp(b.id, t(1)).await.unwrap();
        repo.update_timestamp(c.id, t(2)).await.unwrap();

        let due = repo.list_least_recently_updated(2).await.unwrap();
        let names: Vec<&str> = due.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);

        let refreshed = repo.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(refreshed.updated_at, t(1));
    }

    #[tokio::test]
    async fn test_delete_by_name() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);

        repo.create(&new_feed("gone")).await.unwrap();
        repo.delete_by_name("gone").await.unwrap();

        assert_eq!(repo.list(0).await.unwrap().len(), 0);
        assert!(matches!(
            repo.delete_by_name("gone").await,
            Err(Error::FeedNotFound(_))
        ));
    }
}
