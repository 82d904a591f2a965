use anyhow::Result;

use feedhub_core::{
    storage::{Database, Repository},
    Error,
};

pub async fn run(db: &Database, name: &str) -> Result<()> {
    match db.delete_feed(name).await {
        Ok(()) => {
            println!("Deleted feed: {}", name);
            Ok(())
        }
        Err(Error::FeedNotFound(missing)) => {
            let feeds = db.list_feeds(0).await?;
            if !feeds.is_empty() {
                println!("Available feeds:");
                for f in &feeds {
                    println!("  - {}", f.name);
                }
            }
            Err(Error::FeedNotFound(missing).into())
        }
        Err(e) => Err(e.into()),
    }
}
