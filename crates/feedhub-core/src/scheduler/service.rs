use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::interval::format_interval;
use super::worker::{JobReceiver, WorkerContext, WorkerPool};
use crate::config::SchedulerSettings;
use crate::feed::{Feed, Fetcher};
use crate::storage::Repository;
use crate::{Error, Result};

/// Static scheduler parameters plus the initial live configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub interval: Duration,
    pub workers: usize,
    /// Feeds loaded per dispatch tick
    pub batch_size: usize,
    pub queue_capacity: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(180),
            workers: 3,
            batch_size: 5,
            queue_capacity: 100,
        }
    }
}

impl SchedulerOptions {
    pub fn from_settings(settings: &SchedulerSettings) -> Result<Self> {
        Ok(Self {
            interval: settings.interval()?,
            workers: settings.workers,
            batch_size: settings.batch_size,
            queue_capacity: settings.queue_capacity,
        })
    }
}

struct State {
    interval: Duration,
    worker_count: usize,
    running: Option<Running>,
}

struct Running {
    token: CancellationToken,
    interval_tx: watch::Sender<Duration>,
    dispatcher: JoinHandle<()>,
    jobs: JobReceiver,
    pool: WorkerPool,
}

/// Timer-driven dispatcher that owns the worker pool.
///
/// Every tick loads a batch of the least recently fetched feeds and queues
/// them for the workers. Interval and pool size can be changed while running.
pub struct Scheduler {
    repo: Arc<dyn Repository>,
    fetcher: Arc<dyn Fetcher>,
    batch_size: usize,
    queue_capacity: usize,
    state: Mutex<State>,
    /// Copy of the running token, reachable without waiting on `state`
    run_token: std::sync::Mutex<Option<CancellationToken>>,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn Repository>,
        fetcher: Arc<dyn Fetcher>,
        options: SchedulerOptions,
    ) -> Result<Self> {
        if options.interval.is_zero() {
            return Err(Error::InvalidInterval(format_interval(options.interval)));
        }
        if options.workers == 0 {
            return Err(Error::InvalidWorkerCount(0));
        }
        if options.batch_size == 0 || options.queue_capacity == 0 {
            return Err(Error::Config(
                "batch_size and queue_capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            repo,
            fetcher,
            batch_size: options.batch_size,
            queue_capacity: options.queue_capacity,
            state: Mutex::new(State {
                interval: options.interval,
                worker_count: options.workers,
                running: None,
            }),
            run_token: std::sync::Mutex::new(None),
        })
    }

    /// Start the dispatch timer and the workers as children of `parent`.
    ///
    /// Returns as soon as the background tasks are spawned. The first tick
    /// fires one interval from now.
    pub async fn start(&self, parent: &CancellationToken) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.running.is_some() {
            return Err(Error::AlreadyRunning("scheduler".to_string()));
        }

        let token = parent.child_token();
        let (job_tx, job_rx) = mpsc::channel(self.queue_capacity);
        let jobs: JobReceiver = Arc::new(Mutex::new(job_rx));
        let (interval_tx, interval_rx) = watch::channel(state.interval);

        let dispatcher = tokio::spawn(run_dispatcher(
            self.repo.clone(),
            job_tx,
            interval_rx,
            self.batch_size,
            token.clone(),
        ));

        let mut pool = WorkerPool::new(WorkerContext {
            repo: self.repo.clone(),
            fetcher: self.fetcher.clone(),
            jobs: jobs.clone(),
            shutdown: token.clone(),
        });
        pool.grow(state.worker_count);

        info!(
            interval = %format_interval(state.interval),
            workers = state.worker_count,
            "Scheduler started"
        );

        *self.lock_run_token() = Some(token.clone());
        state.running = Some(Running {
            token,
            interval_tx,
            dispatcher,
            jobs,
            pool,
        });
        Ok(())
    }

    /// Cancel the timer and every worker, then wait for all of them to exit.
    ///
    /// In-flight jobs are abandoned and queued ones are dropped.
    pub async fn stop(&self) -> Result<()> {
        // Cancel first so a resize blocked on a busy worker lets go of `state`
        let token = self.lock_run_token().take();
        if let Some(token) = &token {
            token.cancel();
        }

        let mut state = self.state.lock().await;
        let Some(mut running) = state.running.take() else {
            return Err(Error::NotRunning("scheduler".to_string()));
        };

        running.token.cancel();

        if let Err(e) = running.dispatcher.await {
            error!("Dispatch task failed: {}", e);
        }
        running.pool.join_all().await;

        let mut abandoned = 0;
        {
            let mut rx = running.jobs.lock().await;
            while rx.try_recv().is_ok() {
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            debug!("Dropped {} queued jobs", abandoned);
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Change the dispatch period. A running timer switches over after its
    /// current tick completes.
    pub async fn set_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval(format_interval(interval)));
        }

        let mut state = self.state.lock().await;
        if let Some(running) = &state.running {
            running.interval_tx.send_replace(interval);
        }
        if state.interval != interval {
            info!(
                from = %format_interval(state.interval),
                to = %format_interval(interval),
                "Fetch interval changed"
            );
        }
        state.interval = interval;
        Ok(())
    }

    /// Grow or shrink the worker pool to exactly `workers`.
    ///
    /// Shrinking waits for the removed workers to finish their current job.
    pub async fn resize(&self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(Error::InvalidWorkerCount(0));
        }

        let mut state = self.state.lock().await;
        let current = state.worker_count;
        if workers == current {
            return Ok(());
        }

        if let Some(running) = state.running.as_mut() {
            if workers > current {
                running.pool.grow(workers - current);
            } else {
                running.pool.shrink(current - workers).await;
            }
        }

        info!(from = current, to = workers, "Worker count changed");
        state.worker_count = workers;
        Ok(())
    }

    pub async fn interval(&self) -> Duration {
        self.state.lock().await.interval
    }

    pub async fn worker_count(&self) -> usize {
        self.state.lock().await.worker_count
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running.is_some()
    }

    /// Number of live worker tasks; zero while stopped
    pub async fn active_workers(&self) -> usize {
        self.state
            .lock()
            .await
            .running
            .as_ref()
            .map_or(0, |r| r.pool.len())
    }
}

impl Scheduler {
    fn lock_run_token(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.run_token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_dispatcher(
    repo: Arc<dyn Repository>,
    jobs: mpsc::Sender<Feed>,
    mut period: watch::Receiver<Duration>,
    batch_size: usize,
    token: CancellationToken,
) {
    let mut timer = ticker(*period.borrow_and_update());

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            changed = period.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = *period.borrow_and_update();
                debug!(interval = %format_interval(next), "Restarting dispatch timer");
                timer = ticker(next);
            }
            _ = timer.tick() => {
                dispatch_due_feeds(repo.as_ref(), &jobs, batch_size, &token).await;
            }
        }
    }

    debug!("Dispatch loop stopped");
}

async fn dispatch_due_feeds(
    repo: &dyn Repository,
    jobs: &mpsc::Sender<Feed>,
    batch_size: usize,
    token: &CancellationToken,
) {
    let feeds = match repo.list_due_feeds(batch_size).await {
        Ok(feeds) => feeds,
        Err(e) => {
            error!("Failed to load due feeds: {}", e);
            return;
        }
    };

    debug!("Dispatching {} feeds", feeds.len());

    for feed in feeds {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            sent = jobs.send(feed) => {
                if sent.is_err() {
                    warn!("Job queue closed, dropping remaining feeds");
                    return;
                }
            }
        }
    }
}
