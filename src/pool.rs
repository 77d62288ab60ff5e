//! Fixed-size work pool fanning out one task per chromosome.
//!
//! Chromosomes are independent partitions of the variant data, so one
//! task per chromosome runs safely without locking inside task bodies.
//! Progress is weighted by chromosome length in base pairs rather than
//! task count: chromosome sizes vary by orders of magnitude, and a
//! task-count bar showing 21 of 22 done while chromosome 1 still runs
//! would be badly misleading.
//!
//! The coordinating call blocks, polling on a short interval so it can
//! react to [`WorkPool::stop`] promptly; a completed task wakes the
//! poller early through the result channel. Cancellation is a
//! first-class outcome, distinct from both success and failure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::genome::Position;
use crate::multigenome::GenosyncError;

/// One unit of work: a chromosome's name, its length in base pairs
/// (the progress weight), and the work itself.
pub struct ChromosomeTask<F> {
    pub name: String,
    pub weight: Position,
    pub work: F,
}

impl<F> ChromosomeTask<F> {
    pub fn new(name: impl Into<String>, weight: Position, work: F) -> Self {
        Self {
            name: name.into(),
            weight,
            work,
        }
    }
}

/// Terminal outcome of a pool run. Cancellation is not an error;
/// callers must match on it explicitly.
#[derive(Debug)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The completed value, or `None` when the run was cancelled.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }
}

enum TaskMessage<T> {
    Done(String, T),
    Skipped,
    Failed(GenosyncError),
}

/// Length-weighted completion fraction.
pub fn weighted_progress(finished_weight: u64, total_weight: u64) -> f64 {
    if total_weight == 0 {
        return 1.0;
    }
    finished_weight as f64 / total_weight as f64
}

/// A bounded worker pool executing one task per chromosome.
pub struct WorkPool {
    pool: rayon::ThreadPool,
    cancel: Arc<AtomicBool>,
    finished_weight: Arc<AtomicU64>,
    total_weight: AtomicU64,
    poll_interval: Duration,
    show_progress: bool,
}

impl WorkPool {
    /// A pool sized to the host's available core count.
    pub fn new() -> Result<Self, GenosyncError> {
        Self::with_threads(0)
    }

    /// A pool with an explicit thread count (0 = available cores).
    pub fn with_threads(num_threads: usize) -> Result<Self, GenosyncError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| GenosyncError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            cancel: Arc::new(AtomicBool::new(false)),
            finished_weight: Arc::new(AtomicU64::new(0)),
            total_weight: AtomicU64::new(0),
            poll_interval: Duration::from_secs(1),
            show_progress: true,
        })
    }

    /// Override the coordinator poll interval (tests use a short one).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Suppress the terminal progress bar.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Request cancellation: unstarted tasks are skipped, the
    /// coordinator returns [`Outcome::Cancelled`] within one poll tick,
    /// and any partial results are discarded wholesale. A stopped pool
    /// stays stopped.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Length-weighted fraction of the current run that has finished.
    pub fn fraction_complete(&self) -> f64 {
        weighted_progress(
            self.finished_weight.load(Ordering::SeqCst),
            self.total_weight.load(Ordering::SeqCst),
        )
    }

    /// Fan the tasks out and block until every task completes, a task
    /// fails, or the pool is stopped.
    ///
    /// A task error fails the whole run: no per-chromosome
    /// partial-success mode exists, because a genome with some
    /// chromosomes synchronized and others not is not safe to expose.
    pub fn run<T, F>(
        &self,
        tasks: Vec<ChromosomeTask<F>>,
    ) -> Result<Outcome<Vec<(String, T)>>, GenosyncError>
    where
        F: FnOnce() -> Result<T, GenosyncError> + Send + 'static,
        T: Send + 'static,
    {
        let total: u64 = tasks.iter().map(|t| t.weight).sum();
        self.total_weight.store(total, Ordering::SeqCst);
        self.finished_weight.store(0, Ordering::SeqCst);

        let bar = if self.show_progress {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };

        let (tx, rx) = mpsc::channel::<TaskMessage<T>>();
        let mut outstanding = tasks.len();

        for task in tasks {
            let tx = tx.clone();
            let cancel = Arc::clone(&self.cancel);
            let finished = Arc::clone(&self.finished_weight);
            self.pool.spawn(move || {
                if cancel.load(Ordering::SeqCst) {
                    let _ = tx.send(TaskMessage::Skipped);
                    return;
                }
                match (task.work)() {
                    Ok(value) => {
                        finished.fetch_add(task.weight, Ordering::SeqCst);
                        let _ = tx.send(TaskMessage::Done(task.name, value));
                    }
                    Err(e) => {
                        // fail fast: no further tasks should start
                        cancel.store(true, Ordering::SeqCst);
                        let _ = tx.send(TaskMessage::Failed(e));
                    }
                }
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(outstanding);
        while outstanding > 0 {
            if self.is_stopped() {
                bar.abandon();
                return Ok(Outcome::Cancelled);
            }
            match rx.recv_timeout(self.poll_interval) {
                Ok(TaskMessage::Done(name, value)) => {
                    outstanding -= 1;
                    bar.set_position(self.finished_weight.load(Ordering::SeqCst));
                    results.push((name, value));
                }
                Ok(TaskMessage::Skipped) => {
                    outstanding -= 1;
                }
                Ok(TaskMessage::Failed(e)) => {
                    bar.abandon();
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => {
                    bar.set_position(self.finished_weight.load(Ordering::SeqCst));
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if self.is_stopped() {
            bar.abandon();
            return Ok(Outcome::Cancelled);
        }
        bar.finish_and_clear();
        Ok(Outcome::Completed(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn quiet_pool(threads: usize) -> WorkPool {
        WorkPool::with_threads(threads)
            .unwrap()
            .quiet()
            .with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_weighted_progress_uses_lengths_not_counts() {
        // three of four chromosomes done, but they are the tiny ones
        let finished = 300u64;
        let total = 100 + 100 + 100 + 1_000_000u64;
        let fraction = weighted_progress(finished, total);
        assert!((fraction - 300.0 / 1_000_300.0).abs() < 1e-12);
        assert!(fraction < 0.001, "progress must not read as 75%");
    }

    #[test]
    fn test_run_completes_all_tasks() {
        let pool = quiet_pool(2);
        let tasks: Vec<ChromosomeTask<_>> = (1..=4)
            .map(|i| {
                ChromosomeTask::new(format!("chr{}", i), 100 * i as u64, move || Ok(i * 10))
            })
            .collect();
        let outcome = pool.run(tasks).unwrap();
        let mut results = outcome.completed().unwrap();
        results.sort();
        assert_eq!(
            results,
            vec![
                ("chr1".to_string(), 10),
                ("chr2".to_string(), 20),
                ("chr3".to_string(), 30),
                ("chr4".to_string(), 40),
            ]
        );
        assert!((pool.fraction_complete() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_stop_yields_cancelled_not_partial_results() {
        let pool = Arc::new(quiet_pool(1));
        pool.stop();
        let tasks: Vec<ChromosomeTask<_>> = (0..8)
            .map(|i| {
                ChromosomeTask::new(format!("chr{}", i), 100, move || {
                    thread::sleep(Duration::from_millis(20));
                    Ok(i)
                })
            })
            .collect();
        let outcome = pool.run(tasks).unwrap();
        assert!(outcome.is_cancelled());
        assert!(outcome.completed().is_none());
    }

    #[test]
    fn test_stop_mid_run() {
        let pool = Arc::new(quiet_pool(1));
        let stopper = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(15));
            stopper.stop();
        });
        let tasks: Vec<ChromosomeTask<_>> = (0..20)
            .map(|i| {
                ChromosomeTask::new(format!("chr{}", i), 100, move || {
                    thread::sleep(Duration::from_millis(10));
                    Ok(i)
                })
            })
            .collect();
        let outcome = pool.run(tasks).unwrap();
        assert!(outcome.is_cancelled());
        handle.join().unwrap();
    }

    #[test]
    fn test_task_failure_fails_whole_run() {
        let pool = quiet_pool(2);
        let tasks: Vec<ChromosomeTask<fn() -> Result<u64, GenosyncError>>> = vec![
            ChromosomeTask::new("chr1", 100, || Ok(1u64)),
            ChromosomeTask::new("chr2", 100, || {
                Err(GenosyncError::Pool("boom".to_string()))
            }),
        ];
        assert!(pool.run(tasks).is_err());
    }

    #[test]
    fn test_zero_tasks_complete_immediately() {
        let pool = quiet_pool(1);
        let tasks: Vec<ChromosomeTask<fn() -> Result<u8, GenosyncError>>> = vec![];
        let outcome = pool.run(tasks).unwrap();
        assert_eq!(outcome.completed().unwrap().len(), 0);
        assert!((pool.fraction_complete() - 1.0).abs() < 1e-12);
    }
}
