use std::sync::mpsc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{PlsaError, Result};

/// Results a worker may leave queued per pool thread before it blocks.
const QUEUED_RESULTS_PER_WORKER: usize = 2;

/// Bounded worker pool for independent per-document jobs.
///
/// `run_all` is the only entry point: it submits one job per item, streams each
/// job's result back to the calling thread, and returns once every job has
/// finished. Jobs are never cancelled.
pub struct Dispatcher {
    pool: ThreadPool,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(PlsaError::invalid_config("worker count must be positive"));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("plsa-worker-{i}"))
            .build()
            .map_err(|e| PlsaError::invalid_config(format!("cannot start worker pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Capacity of the result queue between the workers and the sink.
    pub fn queue_capacity(&self) -> usize {
        self.workers() * QUEUED_RESULTS_PER_WORKER
    }

    /// Runs `job` for every item on the pool and feeds the results to `sink`.
    ///
    /// `sink` runs on the calling thread, one result at a time, in completion
    /// order, so it may own mutable state without locking. At most
    /// `queue_capacity()` results wait for the sink; a worker holding another
    /// one blocks until the sink catches up. The call is the barrier: when it
    /// returns every job has completed and every result has been consumed.
    ///
    /// Must not be called from one of this dispatcher's own workers.
    pub fn run_all<I, J, S, T>(&self, items: I, job: J, mut sink: S)
    where
        I: IntoParallelIterator + Send,
        J: Fn(I::Item) -> T + Send + Sync,
        S: FnMut(T),
        T: Send,
    {
        let (tx, rx) = mpsc::sync_channel(self.queue_capacity());
        self.pool.in_place_scope(|scope| {
            scope.spawn(move |_| {
                items.into_par_iter().for_each_with(tx, |tx, item| {
                    // the receiver outlives every sender
                    let _ = tx.send(job(item));
                });
            });
            for result in rx {
                sink(result);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn rejects_empty_pool() {
        assert!(Dispatcher::new(0).is_err());
        assert_eq!(Dispatcher::new(3).unwrap().workers(), 3);
    }

    #[test]
    fn every_job_result_reaches_the_sink() {
        let dispatcher = Dispatcher::new(4).unwrap();
        let mut seen = vec![false; 1000];
        dispatcher.run_all(0..1000usize, |i| i, |i| seen[i] = true);
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn partial_accumulations_are_never_lost() {
        // each job owns a disjoint slot pattern; the fold must equal the plain sum
        const JOBS: usize = 512;
        const WIDTH: usize = 64;
        let dispatcher = Dispatcher::new(8).unwrap();
        let mut acc = vec![0.0f64; WIDTH];
        dispatcher.run_all(
            0..JOBS,
            |j| {
                let mut partial = vec![0.0f64; WIDTH];
                partial[j % WIDTH] = (j + 1) as f64;
                partial
            },
            |partial| {
                for (a, p) in acc.iter_mut().zip(partial) {
                    *a += p;
                }
            },
        );
        let mut expected = vec![0.0f64; WIDTH];
        for j in 0..JOBS {
            expected[j % WIDTH] += (j + 1) as f64;
        }
        assert_eq!(acc, expected);
    }

    #[test]
    fn slow_sink_holds_back_the_workers() {
        let dispatcher = Dispatcher::new(8).unwrap();
        let produced = AtomicUsize::new(0);
        let mut consumed = 0usize;
        let mut peak = 0usize;
        dispatcher.run_all(
            0..400usize,
            |i| {
                produced.fetch_add(1, Ordering::SeqCst);
                vec![i as f64; 512]
            },
            |_| {
                consumed += 1;
                peak = peak.max(produced.load(Ordering::SeqCst) - consumed);
                thread::sleep(Duration::from_micros(200));
            },
        );
        assert_eq!(consumed, 400);
        // queued results plus at most one held by each blocked worker
        let bound = dispatcher.queue_capacity() + dispatcher.workers();
        assert!(peak <= bound, "backlog {peak} exceeds {bound}");
    }

    #[test]
    fn jobs_can_own_mutable_rows() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let mut rows = vec![0u32; 50];
        let mut done = 0;
        dispatcher.run_all(
            rows.par_iter_mut().enumerate(),
            |(i, r)| *r = i as u32 * 2,
            |_| done += 1,
        );
        assert_eq!(done, 50);
        assert!(rows.iter().enumerate().all(|(i, &r)| r == i as u32 * 2));
    }
}
