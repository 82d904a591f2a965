use anyhow::Result;

use feedhub_core::storage::{Database, Repository};

pub async fn run(db: &Database, limit: i64) -> Result<()> {
    let feeds = db.list_feeds(limit).await?;

    if feeds.is_empty() {
        println!("No feeds yet.");
        println!("\nTo add a feed, run:");
        println!("  feedhub add --name <name> --url <url>");
        return Ok(());
    }

    println!("Feeds ({}):\n", feeds.len());

    for feed in &feeds {
        println!("  {}", feed.name);
        println!("    URL: {}", feed.url);
        println!("    Added: {}", feed.created_at.format("%Y-%m-%d %H:%M"));
        println!("    Last fetched: {}", feed.updated_at.format("%Y-%m-%d %H:%M"));
        println!();
    }

    Ok(())
}
