use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A registered feed source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// Last time a fetch cycle finished for this feed
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new feed
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
}

/// One stored item from a feed. `link` is unique across all articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub feed_id: Uuid,
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

/// A decoded feed document
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// One entry of a decoded feed document, before it becomes an [`Article`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publication date exactly as written in the document
    pub pub_date: Option<String>,
}

impl FeedItem {
    /// Build the article to persist for this item
    pub fn to_new_article(&self, feed_id: Uuid, published_at: DateTime<Utc>) -> NewArticle {
        NewArticle {
            feed_id,
            title: self.title.clone(),
            link: self.link.clone(),
            description: self.description.clone(),
            published_at,
        }
    }
}
