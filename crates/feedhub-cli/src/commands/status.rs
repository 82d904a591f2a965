use anyhow::Result;

use feedhub_core::{
    storage::{Database, Repository},
    SingletonLock,
};

pub async fn run(db: &Database) -> Result<()> {
    let lock = SingletonLock::default();
    match lock.live_holder() {
        Some(pid) => {
            println!("Fetch process is running (PID: {})", pid);
            println!("Lock file: {}", lock.path().display());
        }
        None => println!("Fetch process is not running."),
    }

    match db.fetch_scheduler_config().await? {
        Some(stored) => {
            println!("Stored interval: {}", stored.interval);
            println!("Stored workers: {}", stored.workers);
            println!("Last changed: {}", stored.updated_at.format("%Y-%m-%d %H:%M"));
        }
        None => println!("No scheduler config stored yet."),
    }

    let feeds = db.list_feeds(0).await?;
    println!("Feeds: {}", feeds.len());

    Ok(())
}
