use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::interval::{format_interval, parse_interval};
use super::Scheduler;
use crate::storage::Repository;
use crate::{Error, Result};

struct SyncTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps a scheduler's live interval and worker count in line with the
/// values stored in the shared database.
pub struct ConfigSync {
    scheduler: Arc<Scheduler>,
    repo: Arc<dyn Repository>,
    task: Mutex<Option<SyncTask>>,
}

impl ConfigSync {
    pub fn new(scheduler: Arc<Scheduler>, repo: Arc<dyn Repository>) -> Self {
        Self {
            scheduler,
            repo,
            task: Mutex::new(None),
        }
    }

    /// Seed the store if it is empty, then poll it every `poll_interval`
    pub async fn start(&self, poll_interval: Duration, parent: &CancellationToken) -> Result<()> {
        if poll_interval.is_zero() {
            return Err(Error::InvalidInterval(format_interval(poll_interval)));
        }

        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(Error::AlreadyRunning("config sync".to_string()));
        }

        self.bootstrap().await?;

        let token = parent.child_token();
        let handle = tokio::spawn(run_sync_loop(
            self.scheduler.clone(),
            self.repo.clone(),
            poll_interval,
            token.clone(),
        ));

        info!(every = %format_interval(poll_interval), "Config sync started");
        *task = Some(SyncTask { token, handle });
        Ok(())
    }

    /// Stop polling. The scheduler is left as it is.
    pub async fn stop(&self) -> Result<()> {
        let Some(task) = self.task.lock().await.take() else {
            return Err(Error::NotRunning("config sync".to_string()));
        };

        task.token.cancel();
        if let Err(e) = task.handle.await {
            error!("Config sync task failed: {}", e);
        }

        info!("Config sync stopped");
        Ok(())
    }

    /// Read the stored configuration once and apply any difference
    pub async fn sync_once(&self) -> Result<()> {
        sync(&self.scheduler, self.repo.as_ref()).await
    }

    async fn bootstrap(&self) -> Result<()> {
        if self.repo.fetch_scheduler_config().await?.is_some() {
            return Ok(());
        }

        let interval = format_interval(self.scheduler.interval().await);
        let workers = self.scheduler.worker_count().await;
        self.repo.set_scheduler_config(&interval, workers).await?;

        info!(%interval, workers, "Stored initial scheduler config");
        Ok(())
    }
}

async fn run_sync_loop(
    scheduler: Arc<Scheduler>,
    repo: Arc<dyn Repository>,
    poll_interval: Duration,
    token: CancellationToken,
) {
    let mut timer = interval_at(Instant::now() + poll_interval, poll_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = timer.tick() => {
                if let Err(e) = sync(&scheduler, repo.as_ref()).await {
                    error!("Config sync failed: {}", e);
                }
            }
        }
    }

    debug!("Config sync loop stopped");
}

async fn sync(scheduler: &Scheduler, repo: &dyn Repository) -> Result<()> {
    let Some(stored) = repo.fetch_scheduler_config().await? else {
        warn!("No scheduler config stored");
        return Ok(());
    };

    // A bad row is skipped as a whole; the live config stays as it is
    let interval = match parse_interval(&stored.interval) {
        Ok(interval) if !interval.is_zero() => interval,
        Ok(_) => {
            warn!("Ignoring stored config: zero interval {:?}", stored.interval);
            return Ok(());
        }
        Err(e) => {
            warn!("Ignoring stored config: {}", e);
            return Ok(());
        }
    };

    let workers = match usize::try_from(stored.workers) {
        Ok(workers) if workers > 0 => workers,
        _ => {
            warn!("Ignoring stored config: worker count {}", stored.workers);
            return Ok(());
        }
    };

    if interval != scheduler.interval().await {
        scheduler.set_interval(interval).await?;
    }
    if workers != scheduler.worker_count().await {
        scheduler.resize(workers).await?;
    }

    Ok(())
}
