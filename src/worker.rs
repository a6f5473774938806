//! Worker pool for compilation and packaging tasks.
//!
//! A fixed set of worker threads drains a shared FIFO job queue. Each
//! scheduled job returns a [`TaskHandle`] the dispatcher polls for
//! completion on its tick; there is no other synchronization between the
//! pool and the dispatcher.

use crossbeam::channel::{self, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Completion flag for one scheduled job.
pub struct TaskHandle {
    done: Arc<AtomicBool>,
}

impl TaskHandle {
    /// True once the job has run to completion (or panicked).
    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

struct Inflight {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Fixed-size thread pool with FIFO scheduling.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    inflight: Arc<Inflight>,
}

impl WorkerPool {
    /// Pool sized to the machine's available parallelism.
    pub fn new() -> Self {
        let count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::with_workers(count)
    }

    pub fn with_workers(count: usize) -> Self {
        assert!(count > 0, "worker pool needs at least one worker");

        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(count);
        for _ in 0..count {
            let rx = rx.clone();
            workers.push(std::thread::spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
            }));
        }

        Self {
            tx: Some(tx),
            workers,
            inflight: Arc::new(Inflight {
                count: Mutex::new(0),
                idle: Condvar::new(),
            }),
        }
    }

    /// Enqueue a job. Queued jobs count as in-flight for `wait_all`.
    ///
    /// Scheduling after `shutdown` is a programming error.
    pub fn schedule(&self, job: impl FnOnce() + Send + 'static) -> TaskHandle {
        let tx = self.tx.as_ref().expect("schedule after worker pool shutdown");

        *self.inflight.count.lock() += 1;

        let done = Arc::new(AtomicBool::new(false));
        let handle = TaskHandle { done: done.clone() };
        let inflight = Arc::clone(&self.inflight);

        let wrapped: Job = Box::new(move || {
            // A panicking job must not wedge the pool or its waiters
            let _ = panic::catch_unwind(AssertUnwindSafe(job));

            done.store(true, Ordering::Release);
            let mut count = inflight.count.lock();
            *count -= 1;
            if *count == 0 {
                inflight.idle.notify_all();
            }
        });

        tx.send(wrapped).expect("worker pool channel closed");
        handle
    }

    /// Block until every scheduled job has completed.
    pub fn wait_all(&self) {
        let mut count = self.inflight.count.lock();
        while *count > 0 {
            self.inflight.idle.wait(&mut count);
        }
    }

    /// Number of queued + running jobs.
    pub fn num_inflight(&self) -> usize {
        *self.inflight.count.lock()
    }

    /// Close the queue and join the workers. Pending jobs still run.
    pub fn shutdown(&mut self) {
        self.tx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_schedule_and_complete() {
        let mut pool = WorkerPool::with_workers(2);
        let ran = Arc::new(AtomicBool::new(false));

        let handle = pool.schedule({
            let ran = ran.clone();
            move || ran.store(true, Ordering::SeqCst)
        });

        pool.wait_all();
        assert!(handle.is_complete());
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(pool.num_inflight(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_wait_all_many_jobs() {
        let mut pool = WorkerPool::with_workers(4);
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                pool.schedule({
                    let counter = counter.clone();
                    move || {
                        std::thread::sleep(Duration::from_millis(1));
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        pool.wait_all();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        assert!(handles.iter().all(TaskHandle::is_complete));
        pool.shutdown();
    }

    #[test]
    fn test_panicking_job_does_not_wedge_pool() {
        let mut pool = WorkerPool::with_workers(1);

        let bad = pool.schedule(|| panic!("boom"));
        let good = pool.schedule(|| {});

        pool.wait_all();
        assert!(bad.is_complete());
        assert!(good.is_complete());
        assert_eq!(pool.num_inflight(), 0);
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_runs_pending_jobs() {
        let mut pool = WorkerPool::with_workers(1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            pool.schedule({
                let counter = counter.clone();
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
