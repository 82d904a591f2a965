use anyhow::{bail, Context, Result};

use feedhub_core::{
    feed::{FeedFetcher, Fetcher, NewFeed},
    storage::{Database, Repository},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig, name: &str, url: &str) -> Result<()> {
    println!("Checking feed: {}", url);

    // Only feeds that can be fetched and decoded get registered
    let fetcher = FeedFetcher::new(config)?;
    let parsed = fetcher
        .fetch_and_parse(url)
        .await
        .with_context(|| format!("'{}' is not a usable feed", url))?;
    if parsed.title.trim().is_empty() {
        bail!("'{}' has no channel title", url);
    }

    let feed = db
        .add_feed(&NewFeed {
            name: name.to_string(),
            url: url.to_string(),
        })
        .await?;

    println!("Added feed: {} ({})", feed.name, feed.id);
    println!("Feed title: {}", parsed.title);
    println!("{} items currently published.", parsed.items.len());

    Ok(())
}
