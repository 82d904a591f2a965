//! In-memory doubles for the storage and fetch capabilities

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use uuid::Uuid;

use crate::feed::{Article, Feed, FeedItem, Fetcher, NewArticle, NewFeed, ParsedFeed};
use crate::storage::{Repository, StoredSchedulerConfig};
use crate::{Error, Result};

#[derive(Default)]
pub struct FakeRepository {
    feeds: Mutex<Vec<Feed>>,
    articles: Mutex<Vec<NewArticle>>,
    config: Mutex<Option<StoredSchedulerConfig>>,
    due_calls: Mutex<Vec<Instant>>,
    timestamp_updates: Mutex<Vec<Uuid>>,
    fail_due: AtomicBool,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `count` feeds named `feed-0..` pointing at `https://feed-N.test/rss`
    pub fn with_feeds(count: usize) -> Self {
        let repo = Self::new();
        for i in 0..count {
            repo.insert_feed(&format!("feed-{}", i), &format!("https://feed-{}.test/rss", i));
        }
        repo
    }

    pub fn insert_feed(&self, name: &str, url: &str) -> Feed {
        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.feeds.lock().unwrap().push(feed.clone());
        feed
    }

    pub fn set_stored_config(&self, interval: &str, workers: i64) {
        *self.config.lock().unwrap() = Some(StoredSchedulerConfig {
            interval: interval.to_string(),
            workers,
            updated_at: Utc::now(),
        });
    }

    pub fn stored_config(&self) -> Option<StoredSchedulerConfig> {
        self.config.lock().unwrap().clone()
    }

    /// Clock readings of every `list_due_feeds` call, one per dispatch tick
    pub fn due_calls(&self) -> Vec<Instant> {
        self.due_calls.lock().unwrap().clone()
    }

    pub fn stored_links(&self) -> Vec<String> {
        self.articles
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.link.clone())
            .collect()
    }

    pub fn stored_articles(&self) -> Vec<NewArticle> {
        self.articles.lock().unwrap().clone()
    }

    /// Feed ids in the order their fetch cycles finished
    pub fn timestamp_updates(&self) -> Vec<Uuid> {
        self.timestamp_updates.lock().unwrap().clone()
    }

    pub fn fail_due_feeds(&self, fail: bool) {
        self.fail_due.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Repository for FakeRepository {
    async fn add_feed(&self, feed: &NewFeed) -> Result<Feed> {
        if self.feeds.lock().unwrap().iter().any(|f| f.name == feed.name) {
            return Err(Error::FeedExists(feed.name.clone()));
        }
        Ok(self.insert_feed(&feed.name, &feed.url))
    }

    async fn list_feeds(&self, limit: i64) -> Result<Vec<Feed>> {
        if limit < 0 {
            return Err(Error::InvalidLimit(limit));
        }
        let feeds = self.feeds.lock().unwrap();
        let take = if limit == 0 { feeds.len() } else { limit as usize };
        Ok(feeds.iter().rev().take(take).cloned().collect())
    }

    async fn list_due_feeds(&self, limit: usize) -> Result<Vec<Feed>> {
        self.due_calls.lock().unwrap().push(Instant::now());
        if self.fail_due.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }
        let mut feeds = self.feeds.lock().unwrap().clone();
        feeds.sort_by_key(|f| f.updated_at);
        feeds.truncate(limit);
        Ok(feeds)
    }

    async fn find_feed_by_name(&self, name: &str) -> Result<Option<Feed>> {
        Ok(self
            .feeds
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.name == name)
            .cloned())
    }

    async fn delete_feed(&self, name: &str) -> Result<()> {
        let mut feeds = self.feeds.lock().unwrap();
        let before = feeds.len();
        feeds.retain(|f| f.name != name);
        if feeds.len() == before {
            return Err(Error::FeedNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn update_feed_timestamp(&self, feed_id: Uuid, updated_at: DateTime<Utc>) -> Result<()> {
        if let Some(feed) = self.feeds.lock().unwrap().iter_mut().find(|f| f.id == feed_id) {
            feed.updated_at = updated_at;
        }
        self.timestamp_updates.lock().unwrap().push(feed_id);
        Ok(())
    }

    async fn add_article(&self, article: &NewArticle) -> Result<bool> {
        let mut articles = self.articles.lock().unwrap();
        if articles.iter().any(|a| a.link == article.link) {
            return Ok(false);
        }
        articles.push(article.clone());
        Ok(true)
    }

    async fn list_articles_by_feed(&self, feed_id: Uuid, limit: usize) -> Result<Vec<Article>> {
        let now = Utc::now();
        let mut articles: Vec<Article> = self
            .articles
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.feed_id == feed_id)
            .map(|a| Article {
                id: Uuid::new_v4(),
                feed_id: a.feed_id,
                title: a.title.clone(),
                link: a.link.clone(),
                description: a.description.clone(),
                published_at: a.published_at,
                created_at: now,
                updated_at: now,
            })
            .collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        articles.truncate(limit);
        Ok(articles)
    }

    async fn fetch_scheduler_config(&self) -> Result<Option<StoredSchedulerConfig>> {
        Ok(self.stored_config())
    }

    async fn set_scheduler_config(&self, interval: &str, workers: usize) -> Result<()> {
        self.set_stored_config(interval, workers as i64);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Serves canned documents by URL. Unknown URLs fail like a 404.
#[derive(Default)]
pub struct FakeFetcher {
    documents: Mutex<HashMap<String, ParsedFeed>>,
    gate: Option<Arc<Semaphore>>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits for a permit on the returned semaphore before answering
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (fetcher, gate)
    }

    /// Serve one item per link for `url`, with the given raw dates
    pub fn serve(&self, url: &str, items: &[(&str, Option<&str>)]) {
        let items = items
            .iter()
            .map(|(link, date)| FeedItem {
                title: format!("Item {}", link),
                link: link.to_string(),
                description: String::new(),
                pub_date: date.map(str::to_string),
            })
            .collect();
        self.documents.lock().unwrap().insert(
            url.to_string(),
            ParsedFeed {
                title: "Fake".to_string(),
                items,
                ..ParsedFeed::default()
            },
        );
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_and_parse(&self, url: &str) -> Result<ParsedFeed> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| Error::NotRunning("fetch gate".to_string()))?
                .forget();
        }
        self.finished.fetch_add(1, Ordering::SeqCst);

        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::UnexpectedStatus {
                status: 404,
                url: url.to_string(),
            })
    }
}
