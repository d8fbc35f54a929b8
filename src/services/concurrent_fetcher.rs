//! Bounded fan-out for sub-resource fetches.
//!
//! A [`ConcurrentFetcher`] resolves a batch of named sub-resources (a
//! record's field values, a page of records, comment threads) with a
//! fixed number of workers pulling from one shared queue. The producer
//! enqueues every job and then closes the queue; a worker exits when the
//! queue is closed and drained, so completion does not depend on a
//! sentinel count matching the worker count.
//!
//! A failed fetch is logged and recorded under its name; the worker moves
//! on to the next job. Nothing is raised to the caller, who must treat a
//! name missing from [`FetchOutcome::resolved`] as unresolved.

use std::collections::HashMap;
use std::future::Future;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};

use crate::domain::errors::DomainResult;

/// Default number of records resolved concurrently per page.
pub const DEFAULT_PAGE_WORKERS: usize = 10;

/// One unit of work: fetch `resource_id` of `parent_id` and file the
/// result under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub parent_id: String,
    pub name: String,
    pub resource_id: String,
}

impl FetchJob {
    pub fn new(
        parent_id: impl Into<String>,
        name: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            parent_id: parent_id.into(),
            name: name.into(),
            resource_id: resource_id.into(),
        }
    }
}

/// Merged results of a batch, keyed by job name.
///
/// Every submitted name lands in exactly one of the two maps.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub resolved: HashMap<String, T>,
    pub failed: HashMap<String, String>,
}

impl<T> Default for FetchOutcome<T> {
    fn default() -> Self {
        Self {
            resolved: HashMap::new(),
            failed: HashMap::new(),
        }
    }
}

impl<T> FetchOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, name: String, result: Result<T, String>) {
        match result {
            Ok(value) => {
                self.failed.remove(&name);
                self.resolved.insert(name, value);
            }
            Err(error) => {
                self.resolved.remove(&name);
                self.failed.insert(name, error);
            }
        }
    }
}

/// Worker pool size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolSize {
    Fixed(usize),
    /// One worker per job.
    PerJob,
}

/// Bounded worker pool resolving named sub-resources concurrently.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentFetcher {
    pool: PoolSize,
}

impl Default for ConcurrentFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_WORKERS)
    }
}

impl ConcurrentFetcher {
    /// A pool of at most `workers` workers (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            pool: PoolSize::Fixed(workers.max(1)),
        }
    }

    /// A pool with one worker per job, for batches where every job is a
    /// single remote call.
    pub fn per_job() -> Self {
        Self {
            pool: PoolSize::PerJob,
        }
    }

    /// Number of workers used for a batch of `jobs` jobs.
    pub fn worker_count(&self, jobs: usize) -> usize {
        match self.pool {
            PoolSize::Fixed(workers) => workers.min(jobs),
            PoolSize::PerJob => jobs,
        }
    }

    /// Run `fetch` for every job and merge the results by name.
    pub async fn run<T, F, Fut>(&self, jobs: Vec<FetchJob>, fetch: F) -> FetchOutcome<T>
    where
        F: Fn(FetchJob) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut outcome = FetchOutcome::default();
        let worker_count = self.worker_count(jobs.len());
        if worker_count == 0 {
            return outcome;
        }

        let (tx, rx) = mpsc::channel(jobs.len());
        for job in jobs {
            // Capacity equals the job count, so this never waits.
            if tx.send(job).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Mutex::new(rx);
        let workers = (0..worker_count).map(|worker| {
            let queue = &queue;
            let fetch = &fetch;
            async move {
                let mut results = Vec::new();
                loop {
                    let job = queue.lock().await.recv().await;
                    let Some(job) = job else {
                        break;
                    };
                    let name = job.name.clone();
                    let parent_id = job.parent_id.clone();
                    match fetch(job).await {
                        Ok(value) => results.push((name, Ok(value))),
                        Err(err) => {
                            tracing::error!(
                                worker,
                                parent_id = %parent_id,
                                name = %name,
                                error = %err,
                                "sub-resource fetch failed"
                            );
                            results.push((name, Err(err.to_string())));
                        }
                    }
                }
                results
            }
        });

        for results in join_all(workers).await {
            for (name, result) in results {
                outcome.record(name, result);
            }
        }
        outcome
    }
}
