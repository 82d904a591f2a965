mod dates;
mod fetcher;
mod models;
mod parser;

use chrono::{DateTime, Utc};

use crate::Result;

pub use dates::parse_pub_date;
pub use fetcher::FeedFetcher;
pub use models::{Article, Feed, FeedItem, NewArticle, NewFeed, ParsedFeed};
pub use parser::parse_feed;

/// Capability for retrieving and decoding feed documents
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and decode it. Fails on transport errors, non-success
    /// status codes and documents that cannot be decoded.
    async fn fetch_and_parse(&self, url: &str) -> Result<ParsedFeed>;

    /// Parse a publication date string, trying the known layouts in order
    fn parse_pub_date(&self, raw: &str) -> Result<DateTime<Utc>> {
        parse_pub_date(raw)
    }
}
