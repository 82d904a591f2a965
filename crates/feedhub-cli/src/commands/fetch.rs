use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use feedhub_core::{
    feed::{FeedFetcher, Fetcher},
    scheduler::format_interval,
    storage::{Database, Repository},
    AppConfig, ConfigSync, Scheduler, SchedulerOptions, SingletonLock,
};

/// Run the scheduler and config sync until Ctrl+C or SIGTERM
pub async fn run(db: Arc<Database>, config: &AppConfig) -> Result<()> {
    config.validate()?;
    let options = SchedulerOptions::from_settings(&config.scheduler)?;
    let sync_interval = config.scheduler.sync_interval()?;

    let mut lock = SingletonLock::default();
    lock.acquire()?;

    let repo: Arc<dyn Repository> = db;
    let fetcher: Arc<dyn Fetcher> = Arc::new(FeedFetcher::new(config)?);
    let scheduler = Arc::new(Scheduler::new(repo.clone(), fetcher, options)?);
    let sync = ConfigSync::new(scheduler.clone(), repo);

    let shutdown = CancellationToken::new();
    scheduler.start(&shutdown).await?;

    if let Err(e) = sync.start(sync_interval, &shutdown).await {
        scheduler.stop().await?;
        return Err(e.into());
    }

    println!("Fetching started (PID: {}). Press Ctrl+C to stop.", std::process::id());
    println!("  Interval: {}", format_interval(options.interval));
    println!("  Workers: {}", options.workers);
    println!("  Config sync every: {}", format_interval(sync_interval));

    wait_for_shutdown().await?;
    info!("Received shutdown signal");

    // Interrupt in-flight work before joining anything
    shutdown.cancel();
    if let Err(e) = sync.stop().await {
        warn!("{}", e);
    }
    scheduler.stop().await?;
    lock.release()?;

    println!("Fetching stopped.");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
