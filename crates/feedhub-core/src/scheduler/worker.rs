use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::feed::{Feed, Fetcher};
use crate::storage::Repository;

/// Receiving end of the job queue, shared by every worker
pub(crate) type JobReceiver = Arc<Mutex<mpsc::Receiver<Feed>>>;

/// Everything a worker needs, cloned into each task
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub repo: Arc<dyn Repository>,
    pub fetcher: Arc<dyn Fetcher>,
    pub jobs: JobReceiver,
    /// Scheduler-wide token; cancelling it abandons in-flight jobs
    pub shutdown: CancellationToken,
}

struct WorkerHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Set of running workers, each individually stoppable
pub(crate) struct WorkerPool {
    ctx: WorkerContext,
    workers: BTreeMap<usize, WorkerHandle>,
    next_id: usize,
}

impl WorkerPool {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            workers: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Spawn `count` more workers
    pub fn grow(&mut self, count: usize) {
        for _ in 0..count {
            let id = self.next_id;
            self.next_id += 1;

            let stop = self.ctx.shutdown.child_token();
            let task = tokio::spawn(run_worker(id, self.ctx.clone(), stop.clone()));
            self.workers.insert(id, WorkerHandle { stop, task });
        }
    }

    /// Stop exactly `count` workers, newest first, and wait for them to exit.
    ///
    /// A worker busy with a job finishes it before exiting.
    pub async fn shrink(&mut self, count: usize) {
        debug_assert!(
            count <= self.workers.len(),
            "asked to stop {} of {} workers",
            count,
            self.workers.len()
        );

        let mut stopped = Vec::with_capacity(count);
        for _ in 0..count {
            let Some((id, handle)) = self.workers.pop_last() else {
                break;
            };
            handle.stop.cancel();
            stopped.push((id, handle.task));
        }

        for (id, task) in stopped {
            if let Err(e) = task.await {
                error!(worker = id, "Worker task failed: {}", e);
            }
        }
    }

    /// Wait for every worker to exit. Callers cancel the shutdown token first.
    pub async fn join_all(&mut self) {
        for (id, handle) in std::mem::take(&mut self.workers) {
            if let Err(e) = handle.task.await {
                error!(worker = id, "Worker task failed: {}", e);
            }
        }
    }
}

async fn run_worker(id: usize, ctx: WorkerContext, stop: CancellationToken) {
    debug!(worker = id, "Worker started");

    loop {
        let feed = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            job = next_job(&ctx.jobs) => match job {
                Some(feed) => feed,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = ctx.shutdown.cancelled() => {
                debug!(worker = id, feed = %feed.name, "Abandoning in-flight job");
                break;
            }
            _ = process_feed(ctx.repo.as_ref(), ctx.fetcher.as_ref(), &feed) => {}
        }
    }

    debug!(worker = id, "Worker stopped");
}

async fn next_job(jobs: &JobReceiver) -> Option<Feed> {
    jobs.lock().await.recv().await
}

/// Fetch one feed and persist its items, returning how many were new.
///
/// Failures never escape: a fetch error abandons the feed for this cycle, a
/// storage error skips the affected article. The feed's timestamp is advanced
/// either way so it moves to the back of the due order.
pub(crate) async fn process_feed(repo: &dyn Repository, fetcher: &dyn Fetcher, feed: &Feed) -> usize {
    let mut inserted = 0;

    match fetcher.fetch_and_parse(&feed.url).await {
        Ok(parsed) => {
            for item in &parsed.items {
                if item.link.is_empty() {
                    warn!(feed = %feed.name, title = %item.title, "Skipping item without link");
                    continue;
                }

                let published_at = item
                    .pub_date
                    .as_deref()
                    .and_then(|raw| match fetcher.parse_pub_date(raw) {
                        Ok(date) => Some(date),
                        Err(e) => {
                            debug!(feed = %feed.name, "{}", e);
                            None
                        }
                    })
                    .unwrap_or_else(Utc::now);

                match repo.add_article(&item.to_new_article(feed.id, published_at)).await {
                    Ok(true) => inserted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        error!(feed = %feed.name, link = %item.link, "Failed to store article: {}", e);
                    }
                }
            }

            if inserted > 0 {
                info!(feed = %feed.name, "{} new articles", inserted);
            } else {
                debug!(feed = %feed.name, "No new articles");
            }
        }
        Err(e) => {
            error!(feed = %feed.name, url = %feed.url, "Failed to fetch feed: {}", e);
        }
    }

    if let Err(e) = repo.update_feed_timestamp(feed.id, Utc::now()).await {
        error!(feed = %feed.name, "Failed to update feed timestamp: {}", e);
    }

    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, FakeRepository};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_process_feed_stores_items_in_document_order() {
        let repo = FakeRepository::new();
        let feed = repo.insert_feed("news", "https://news.test/rss");
        let fetcher = FakeFetcher::new();
        fetcher.serve(
            "https://news.test/rss",
            &[
                ("https://news.test/a", Some("Mon, 02 Jan 2006 15:04:05 -0700")),
                ("https://news.test/b", None),
                ("https://news.test/c", Some("someday")),
            ],
        );

        let before = Utc::now();
        let inserted = process_feed(&repo, &fetcher, &feed).await;

        assert_eq!(inserted, 3);
        assert_eq!(
            repo.stored_links(),
            vec!["https://news.test/a", "https://news.test/b", "https://news.test/c"]
        );

        let articles = repo.stored_articles();
        assert_eq!(
            articles[0].published_at,
            Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap()
        );
        // Missing and unparseable dates fall back to the current time
        assert!(articles[1].published_at >= before);
        assert!(articles[2].published_at >= before);
        assert_eq!(repo.timestamp_updates(), vec![feed.id]);
    }

    #[tokio::test]
    async fn test_process_feed_twice_stores_nothing_new() {
        let repo = FakeRepository::new();
        let feed = repo.insert_feed("news", "https://news.test/rss");
        let fetcher = FakeFetcher::new();
        fetcher.serve("https://news.test/rss", &[("https://news.test/a", None)]);

        assert_eq!(process_feed(&repo, &fetcher, &feed).await, 1);
        assert_eq!(process_feed(&repo, &fetcher, &feed).await, 0);
        assert_eq!(repo.stored_links().len(), 1);
    }

    #[tokio::test]
    async fn test_process_feed_skips_items_without_link() {
        let repo = FakeRepository::new();
        let feed = repo.insert_feed("news", "https://news.test/rss");
        let fetcher = FakeFetcher::new();
        fetcher.serve("https://news.test/rss", &[("", None), ("https://news.test/a", None)]);

        assert_eq!(process_feed(&repo, &fetcher, &feed).await, 1);
        assert_eq!(repo.stored_links(), vec!["https://news.test/a"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_still_advances_timestamp() {
        let repo = FakeRepository::new();
        let feed = repo.insert_feed("broken", "https://broken.test/rss");
        let fetcher = FakeFetcher::new();

        assert_eq!(process_feed(&repo, &fetcher, &feed).await, 0);
        assert!(repo.stored_links().is_empty());
        assert_eq!(repo.timestamp_updates(), vec![feed.id]);
    }

    #[tokio::test]
    async fn test_pool_grow_and_shrink() {
        let (_tx, rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let mut pool = WorkerPool::new(WorkerContext {
            repo: Arc::new(FakeRepository::new()),
            fetcher: Arc::new(FakeFetcher::new()),
            jobs: Arc::new(Mutex::new(rx)),
            shutdown: shutdown.clone(),
        });

        pool.grow(4);
        assert_eq!(pool.len(), 4);

        pool.shrink(3).await;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.workers.keys().copied().collect::<Vec<_>>(), vec![1]);

        pool.grow(1);
        assert_eq!(pool.workers.keys().copied().collect::<Vec<_>>(), vec![1, 5]);

        shutdown.cancel();
        pool.join_all().await;
        assert_eq!(pool.len(), 0);
    }
}
