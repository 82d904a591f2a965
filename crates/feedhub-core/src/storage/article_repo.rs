use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{Article, NewArticle};
use crate::Result;

/// Repository for article persistence
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: String,
    feed_id: String,
    title: String,
    link: String,
    description: String,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            feed_id: Uuid::parse_str(&row.feed_id).unwrap_or_default(),
            title: row.title,
            link: row.link,
            description: row.description,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert an article unless its link is already stored.
    ///
    /// Returns `true` when a row was inserted, `false` for a known link.
    pub async fn create(&self, new_article: &NewArticle) -> Result<bool> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (id, feed_id, title, link, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (link) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(new_article.feed_id.to_string())
        .bind(&new_article.title)
        .bind(&new_article.link)
        .bind(&new_article.description)
        .bind(new_article.published_at)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latest articles of a feed, newest publication first
    pub async fn list_by_feed(&self, feed_id: Uuid, limit: usize) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
            SELECT id, feed_id, title, link, description, published_at, created_at, updated_at
            FROM articles
            WHERE feed_id = ?
            ORDER BY published_at DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(feed_id.to_string())
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NewFeed;
    use crate::storage::FeedRepository;
    use chrono::TimeZone;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "news".to_string(),
                url: "https://news.example/rss".to_string(),
            })
            .await
            .unwrap();
        (db, feed.id)
    }

    fn article(feed_id: Uuid, link: &str, day: u32) -> NewArticle {
        NewArticle {
            feed_id,
            title: format!("Title {}", link),
            link: link.to_string(),
            description: "desc".to_string(),
            published_at: Utc.with_ymd_and_hms(2030, 1, day, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_link_is_silently_ignored() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        assert!(repo.create(&article(feed_id, "https://news.example/1", 1)).await.unwrap());

        let mut again = article(feed_id, "https://news.example/1", 2);
        again.title = "Changed title".to_string();
        assert!(!repo.create(&again).await.unwrap());

        let stored = repo.list_by_feed(feed_id, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Title https://news.example/1");
    }

    #[tokio::test]
    async fn test_list_by_feed_newest_first_with_limit() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);

        for (link, day) in [("a", 1), ("b", 3), ("c", 2)] {
            repo.create(&article(feed_id, link, day)).await.unwrap();
        }

        let latest = repo.list_by_feed(feed_id, 2).await.unwrap();
        let links: Vec<&str> = latest.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["b", "c"]);
        assert_eq!(repo.list_by_feed(feed_id, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_articles_removed_with_feed() {
        let (db, feed_id) = setup().await;
        let repo = ArticleRepository::new(&db);
        repo.create(&article(feed_id, "x", 1)).await.unwrap();

        FeedRepository::new(&db).delete_by_name("news").await.unwrap();

        assert_eq!(repo.list_by_feed(feed_id, 10).await.unwrap().len(), 0);
    }
}
