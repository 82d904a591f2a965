use anyhow::Result;

use feedhub_core::{
    storage::{Database, Repository},
    Error,
};

pub async fn run(db: &Database, feed_name: &str, limit: usize) -> Result<()> {
    let feed = db
        .find_feed_by_name(feed_name)
        .await?
        .ok_or_else(|| Error::FeedNotFound(feed_name.to_string()))?;

    let articles = db.list_articles_by_feed(feed.id, limit).await?;

    if articles.is_empty() {
        println!("No articles stored for '{}' yet.", feed.name);
        return Ok(());
    }

    for article in &articles {
        println!("{}", article.title);
        println!("  {}", article.link);
        println!("  Published: {}", article.published_at.format("%Y-%m-%d %H:%M"));
        println!();
    }

    Ok(())
}
