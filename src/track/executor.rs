//! Sequential and parallel execution of chunk retrievals
//!
//! The executor runs every sub-range of an [`IntervalPlan`] through a
//! [`ChunkReader`] and returns the chunk payloads in plan order. The parallel
//! strategy hands jobs to scoped workers over a zero-capacity rendezvous
//! channel: a submission only succeeds when a worker is free to take it, so a
//! burst of large retrievals throttles at the handoff instead of queueing
//! unbounded work. Results come back tagged with their plan position and are
//! reordered on collection, so the output never depends on completion order.
//!
//! Failure handling is fail-fast and cooperative: the first failed chunk sets
//! a shared cancel flag, chunks not yet started are skipped, and the error
//! propagates. An in-flight chunk always runs to completion; partial results
//! are never returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, RecvTimeoutError};

use crate::error::ConcurrencyError;
use crate::track::split::{IntervalPlan, SubRange};
use crate::Result;

/// Thread budget for parallel retrieval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Worker cap; 0 means one worker per core
    pub max_threads: usize,
}

impl ExecutorOptions {
    #[must_use]
    pub const fn new(max_threads: usize) -> Self {
        Self { max_threads }
    }

    /// The effective worker count for this host
    #[must_use]
    pub fn thread_count(&self) -> usize {
        if self.max_threads == 0 {
            num_cpus::get()
        } else {
            num_cpus::get().min(self.max_threads).max(1)
        }
    }
}

/// Reads the payload of one sub-range
///
/// Implementations wrap whatever produces block data for a chunk, typically a
/// feature search against the index or a slice of a reference container.
/// Readers are shared across worker threads, so they take `&self`.
pub trait ChunkReader<B>: Send + Sync {
    /// Produces the payload covering `range`
    ///
    /// # Errors
    /// Any failure reading the underlying data; the executor aborts the whole
    /// retrieval on the first error.
    fn read_chunk(&self, range: &SubRange) -> Result<B>;
}

impl<B, F> ChunkReader<B> for F
where
    F: Fn(&SubRange) -> Result<B> + Send + Sync,
{
    fn read_chunk(&self, range: &SubRange) -> Result<B> {
        self(range)
    }
}

/// Strategy for running the chunks of one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkExecutor {
    /// Run every chunk on the caller thread, in plan order
    Sequential,
    /// Fan chunks out to a bounded worker set
    Parallel { threads: usize },
}

impl ChunkExecutor {
    #[must_use]
    pub const fn sequential() -> Self {
        Self::Sequential
    }

    #[must_use]
    pub fn parallel(options: &ExecutorOptions) -> Self {
        Self::Parallel {
            threads: options.thread_count(),
        }
    }

    /// Sub-range budget for planning a retrieval with this strategy
    ///
    /// Parallel execution plans one chunk per worker. Sequential execution
    /// has no fan-out to bound, so only the block-size budget limits chunks.
    #[must_use]
    pub const fn max_tasks(&self) -> usize {
        match self {
            Self::Sequential => usize::MAX,
            Self::Parallel { threads } => {
                if *threads == 0 {
                    1
                } else {
                    *threads
                }
            }
        }
    }

    /// Runs every chunk of `plan` and returns the payloads in plan order
    ///
    /// Both strategies produce identical output for identical inputs; the
    /// parallel one only changes wall-clock behavior.
    ///
    /// # Arguments
    /// * `plan` - The sub-ranges to retrieve
    /// * `reader` - Shared chunk reader, invoked once per sub-range
    /// * `deadline` - Optional overall wall-clock budget for the retrieval;
    ///   a budget past the clock's range never expires
    ///
    /// # Errors
    /// The first reader error, or [`ConcurrencyError::Timeout`] when the
    /// deadline expires before every chunk finished.
    pub fn retrieve<B, R>(
        &self,
        plan: &IntervalPlan,
        reader: &R,
        deadline: Option<Duration>,
    ) -> Result<Vec<B>>
    where
        B: Send,
        R: ChunkReader<B>,
    {
        match self {
            Self::Sequential => retrieve_sequential(plan, reader, deadline),
            Self::Parallel { threads } => retrieve_parallel(plan, reader, deadline, *threads),
        }
    }
}

fn timeout_error(deadline: Duration, completed: usize, total: usize) -> crate::Error {
    ConcurrencyError::Timeout {
        deadline,
        completed,
        total,
    }
    .into()
}

fn retrieve_sequential<B, R>(
    plan: &IntervalPlan,
    reader: &R,
    deadline: Option<Duration>,
) -> Result<Vec<B>>
where
    R: ChunkReader<B>,
{
    let started = Instant::now();
    let mut results = Vec::with_capacity(plan.len());
    for range in plan.ranges() {
        if let Some(limit) = deadline {
            if started.elapsed() >= limit {
                return Err(timeout_error(limit, results.len(), plan.len()));
            }
        }
        results.push(reader.read_chunk(range)?);
    }
    Ok(results)
}

fn retrieve_parallel<B, R>(
    plan: &IntervalPlan,
    reader: &R,
    deadline: Option<Duration>,
    threads: usize,
) -> Result<Vec<B>>
where
    B: Send,
    R: ChunkReader<B>,
{
    let started = Instant::now();
    // A budget the clock cannot represent never expires
    let expiry = deadline.and_then(|limit| started.checked_add(limit).map(|at| (limit, at)));
    let total = plan.len();
    let worker_count = threads.min(total).max(1);
    let cancelled = AtomicBool::new(false);

    let mut results = std::thread::scope(|scope| -> Result<Vec<(usize, B)>> {
        let (job_tx, job_rx) = bounded::<(usize, &SubRange)>(0);
        let (result_tx, result_rx) = unbounded::<(usize, Result<B>)>();
        let cancelled = &cancelled;

        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (pos, range) in job_rx {
                    if cancelled.load(Ordering::Relaxed) {
                        continue;
                    }
                    let outcome = reader.read_chunk(range);
                    if outcome.is_err() {
                        cancelled.store(true, Ordering::Relaxed);
                    }
                    if result_tx.send((pos, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        // Hand every sub-range to a free worker; the rendezvous blocks until
        // one takes it
        for (pos, range) in plan.ranges().iter().enumerate() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            match expiry {
                Some((limit, at)) => {
                    if job_tx.send_deadline((pos, range), at).is_err() {
                        cancelled.store(true, Ordering::Relaxed);
                        drop(job_tx);
                        return Err(timeout_error(limit, result_rx.len(), total));
                    }
                }
                None => {
                    if job_tx.send((pos, range)).is_err() {
                        break;
                    }
                }
            }
        }
        drop(job_tx);

        // Collect until every worker has drained and hung up
        let mut collected: Vec<(usize, B)> = Vec::with_capacity(total);
        let mut first_err = None;
        loop {
            let (pos, outcome) = match expiry {
                Some((limit, at)) => match result_rx.recv_deadline(at) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        cancelled.store(true, Ordering::Relaxed);
                        return Err(timeout_error(limit, collected.len(), total));
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match result_rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };
            match outcome {
                Ok(payload) => collected.push((pos, payload)),
                Err(err) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(collected),
        }
    })?;

    if results.len() != total {
        // Unreachable unless a worker died without reporting
        return Err(anyhow::anyhow!(
            "parallel retrieval lost {} of {total} chunks",
            total - results.len()
        )
        .into());
    }
    results.sort_unstable_by_key(|(pos, _)| *pos);
    log::debug!(
        "retrieved {total} chunks on {worker_count} workers in {:?}",
        started.elapsed()
    );
    Ok(results.into_iter().map(|(_, payload)| payload).collect())
}
