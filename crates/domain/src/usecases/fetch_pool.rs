//! Bounded-concurrency fetch pool
//!
//! One producer pushes `FetchJob`s in listing order onto a shared queue,
//! `num_workers` workers pull from it and report one outcome per job, and the
//! calling task aggregates outcomes by rank. The results channel closes once
//! every worker has exited, so aggregation always terminates even when the
//! listing holds fewer qualifying stories than requested.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    model::{FetchJob, FetchStats, RankedStory, ResultSet, StoryId},
    ports::ItemSource,
    usecases::aggregate::{JobOutcome, Outcome, RankAggregator},
};

/// Configuration for the fetch pool
#[derive(Debug, Clone)]
pub struct FetchPoolConfig {
    /// Number of concurrent workers
    pub num_workers: usize,
    /// Target number of qualifying stories
    pub num_wanted: usize,
    /// Upper bound on a single item fetch
    pub job_timeout: Duration,
}

impl Default for FetchPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 10,
            num_wanted: 30,
            job_timeout: Duration::from_secs(10),
        }
    }
}

/// Fetches item detail for a listing with a fixed number of workers
pub struct FetchPool<S>
where
    S: ItemSource + ?Sized + 'static,
{
    source: Arc<S>,
    config: FetchPoolConfig,
}

impl<S> FetchPool<S>
where
    S: ItemSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, config: FetchPoolConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetchPoolConfig {
        &self.config
    }

    /// Fetch the listing and return the first `num_wanted` story links by rank
    pub async fn run(&self, ids: &[StoryId]) -> (ResultSet, FetchStats) {
        let num_wanted = self.config.num_wanted;
        if num_wanted == 0 || ids.is_empty() {
            return (ResultSet::default(), FetchStats::default());
        }

        let num_workers = self.config.num_workers.max(1);

        // Ranks are fixed here, before anything runs concurrently
        let jobs: Vec<FetchJob> = ids
            .iter()
            .enumerate()
            .map(|(rank, &id)| FetchJob { id, rank })
            .collect();

        let cancel = CancellationToken::new();
        let (job_tx, job_rx) = mpsc::channel::<FetchJob>(num_workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<JobOutcome>(num_workers);

        let producer = tokio::spawn(produce(jobs, job_tx, cancel.clone()));

        let mut workers = JoinSet::new();
        for worker_id in 0..num_workers {
            workers.spawn(work(
                worker_id,
                Arc::clone(&self.source),
                Arc::clone(&job_rx),
                result_tx.clone(),
                cancel.clone(),
                self.config.job_timeout,
            ));
        }
        // Workers hold the only senders; the stream ends when they all exit
        drop(result_tx);

        let mut aggregator = RankAggregator::new(ids.len(), num_wanted);
        while let Some(outcome) = result_rx.recv().await {
            if aggregator.record(outcome) {
                break;
            }
        }

        cancel.cancel();
        drop(result_rx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Fetch worker ended abnormally");
            }
        }
        if let Err(e) = producer.await {
            tracing::warn!(error = %e, "Job producer ended abnormally");
        }

        let (stories, stats) = aggregator.finish();

        tracing::info!(
            listed = ids.len(),
            completed = stats.completed,
            qualified = stats.qualified,
            filtered = stats.filtered,
            dropped = stats.dropped,
            returned = stories.len(),
            "Fetch pool finished"
        );

        (stories, stats)
    }
}

async fn produce(
    jobs: Vec<FetchJob>,
    job_tx: mpsc::Sender<FetchJob>,
    cancel: CancellationToken,
) {
    for job in jobs {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = job_tx.send(job) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

async fn work<S>(
    worker_id: usize,
    source: Arc<S>,
    jobs: Arc<Mutex<mpsc::Receiver<FetchJob>>>,
    results: mpsc::Sender<JobOutcome>,
    cancel: CancellationToken,
    job_timeout: Duration,
) where
    S: ItemSource + ?Sized,
{
    tracing::trace!(worker_id, "Fetch worker started");

    loop {
        let job = {
            // The lock is what lets several workers share one receiver
            let mut queue = jobs.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = queue.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fetched = tokio::time::timeout(job_timeout, source.get_item(job.id)) => fetched,
        };

        let outcome = match fetched {
            Ok(Ok(item)) => {
                let story = RankedStory::new(item, job.rank);
                if story.is_story_link() {
                    Outcome::Qualified(story)
                } else {
                    Outcome::Filtered
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(worker_id, id = %job.id, error = %e, "Dropping item");
                Outcome::Dropped
            }
            Err(_) => {
                tracing::debug!(
                    worker_id,
                    id = %job.id,
                    timeout_ms = job_timeout.as_millis() as u64,
                    "Dropping item after timeout"
                );
                Outcome::Dropped
            }
        };

        let reported = JobOutcome {
            rank: job.rank,
            outcome,
        };
        if results.send(reported).await.is_err() {
            // Aggregator is done
            break;
        }
    }

    tracing::trace!(worker_id, "Fetch worker exiting");
}
