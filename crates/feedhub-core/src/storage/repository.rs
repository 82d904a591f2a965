use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ArticleRepository, ConfigRepository, Database, FeedRepository, StoredSchedulerConfig};
use crate::feed::{Article, Feed, NewArticle, NewFeed};
use crate::Result;

/// Storage capability consumed by the scheduler, the config sync loop and the CLI
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Register a feed; fails with `FeedExists` when the name is taken
    async fn add_feed(&self, feed: &NewFeed) -> Result<Feed>;

    /// Feeds, newest first. `0` lists all, a negative limit is an error.
    async fn list_feeds(&self, limit: i64) -> Result<Vec<Feed>>;

    /// Feeds ordered by oldest `updated_at` first
    async fn list_due_feeds(&self, limit: usize) -> Result<Vec<Feed>>;

    async fn find_feed_by_name(&self, name: &str) -> Result<Option<Feed>>;

    /// Delete a feed and its articles; fails with `FeedNotFound`
    async fn delete_feed(&self, name: &str) -> Result<()>;

    async fn update_feed_timestamp(&self, feed_id: Uuid, updated_at: DateTime<Utc>) -> Result<()>;

    /// Persist an article. A link that is already stored is not an error;
    /// the return value tells whether a new row was written.
    async fn add_article(&self, article: &NewArticle) -> Result<bool>;

    async fn list_articles_by_feed(&self, feed_id: Uuid, limit: usize) -> Result<Vec<Article>>;

    async fn fetch_scheduler_config(&self) -> Result<Option<StoredSchedulerConfig>>;

    async fn set_scheduler_config(&self, interval: &str, workers: usize) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait::async_trait]
impl Repository for Database {
    async fn add_feed(&self, feed: &NewFeed) -> Result<Feed> {
        FeedRepository::new(self).create(feed).await
    }

    async fn list_feeds(&self, limit: i64) -> Result<Vec<Feed>> {
        FeedRepository::new(self).list(limit).await
    }

    async fn list_due_feeds(&self, limit: usize) -> Result<Vec<Feed>> {
        FeedRepository::new(self).list_least_recently_updated(limit).await
    }

    async fn find_feed_by_name(&self, name: &str) -> Result<Option<Feed>> {
        FeedRepository::new(self).find_by_name(name).await
    }

    async fn delete_feed(&self, name: &str) -> Result<()> {
        FeedRepository::new(self).delete_by_name(name).await
    }

    async fn update_feed_timestamp(&self, feed_id: Uuid, updated_at: DateTime<Utc>) -> Result<()> {
        FeedRepository::new(self).update_timestamp(feed_id, updated_at).await
    }

    async fn add_article(&self, article: &NewArticle) -> Result<bool> {
        ArticleRepository::new(self).create(article).await
    }

    async fn list_articles_by_feed(&self, feed_id: Uuid, limit: usize) -> Result<Vec<Article>> {
        ArticleRepository::new(self).list_by_feed(feed_id, limit).await
    }

    async fn fetch_scheduler_config(&self) -> Result<Option<StoredSchedulerConfig>> {
        ConfigRepository::new(self).get().await
    }

    async fn set_scheduler_config(&self, interval: &str, workers: usize) -> Result<()> {
        ConfigRepository::new(self).set(interval, workers).await
    }

    async fn close(&self) -> Result<()> {
        self.pool().close().await;
        Ok(())
    }
}
