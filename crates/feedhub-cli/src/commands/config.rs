use anyhow::{bail, Result};

use feedhub_core::{
    scheduler::{format_interval, parse_interval},
    storage::{Database, Repository},
    AppConfig,
};

/// Store a new fetch interval, keeping the stored worker count
pub async fn set_interval(db: &Database, config: &AppConfig, raw: &str) -> Result<()> {
    let interval = parse_interval(raw)?;
    if interval.is_zero() {
        bail!("Interval must be greater than zero");
    }

    let workers = match db.fetch_scheduler_config().await? {
        Some(stored) if stored.workers > 0 => stored.workers as usize,
        _ => config.scheduler.workers,
    };

    let interval = format_interval(interval);
    db.set_scheduler_config(&interval, workers).await?;

    println!("Fetch interval set to {}.", interval);
    Ok(())
}

/// Store a new worker count, keeping the stored interval
pub async fn set_workers(db: &Database, config: &AppConfig, workers: usize) -> Result<()> {
    let interval = match db.fetch_scheduler_config().await? {
        Some(stored) if parse_interval(&stored.interval).is_ok() => stored.interval,
        _ => config.scheduler.interval.clone(),
    };

    db.set_scheduler_config(&interval, workers).await?;

    println!("Worker count set to {}.", workers);
    Ok(())
}
