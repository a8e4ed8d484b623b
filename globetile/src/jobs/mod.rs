//! Typed asynchronous jobs and the worker pool that runs them.
//!
//! A [`JobManager`] owns a fixed set of worker threads. Jobs are pushed onto
//! a pending queue guarded by a mutex and condition variable; workers pull
//! from it and push each job's product into a finished channel. The main
//! thread drains that channel non-blockingly once per frame; there is no
//! blocking receive on the render path.
//!
//! Worker-side panics never propagate out of the pool: a panicking job is
//! converted into its [`Job::failure_product`] sentinel and delivered like
//! any other result.
//!
//! # Example
//!
//! ```ignore
//! let manager: JobManager<TileIoResult> = JobManager::new(1)?;
//! manager.enqueue_job(Box::new(TileLoadJob::new(dataset, index)));
//!
//! // Once per frame, on the main thread:
//! while let Some(result) = manager.pop_finished_job() {
//!     cache.put(result.index.hash_key(), result.into_tile());
//! }
//! ```

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// A unit of asynchronous work with a typed result.
///
/// `execute` runs on a worker thread and may block on I/O; `product` yields
/// the result after a successful execution. `failure_product` supplies the
/// sentinel delivered when `execute` panics.
pub trait Job: Send {
    type Product: Send + 'static;

    /// Performs the work. Runs off the calling thread; blocking is fine here.
    fn execute(&mut self);

    /// Consumes the job and yields its result. Only called after `execute`
    /// returned normally.
    fn product(self: Box<Self>) -> Self::Product;

    /// The sentinel result used when `execute` panicked.
    fn failure_product(&self) -> Self::Product;
}

struct Shared<P: Send + 'static> {
    pending: Mutex<VecDeque<Box<dyn Job<Product = P>>>>,
    work_available: Condvar,
    shutdown: AtomicBool,
}

/// Fixed-size worker pool with non-blocking result draining.
pub struct JobManager<P: Send + 'static> {
    shared: Arc<Shared<P>>,
    finished_rx: Receiver<P>,
    workers: Vec<JoinHandle<()>>,
}

impl<P: Send + 'static> JobManager<P> {
    /// Spawns `workers` named worker threads.
    pub fn new(workers: usize) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            work_available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let shared = Arc::clone(&shared);
            let tx = finished_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("globetile-worker-{i}"))
                .spawn(move || worker_loop(shared, tx))?;
            handles.push(handle);
        }

        Ok(Self {
            shared,
            finished_rx,
            workers: handles,
        })
    }

    /// Submits a job for execution and records it pending.
    pub fn enqueue_job(&self, job: Box<dyn Job<Product = P>>) {
        self.shared.pending.lock().push_back(job);
        self.shared.work_available.notify_one();
    }

    /// Number of completed jobs waiting to be popped. Non-blocking.
    pub fn num_finished_jobs(&self) -> usize {
        self.finished_rx.len()
    }

    /// Pops one completed job product, or `None` if none is ready.
    /// Never blocks.
    pub fn pop_finished_job(&self) -> Option<P> {
        self.finished_rx.try_recv().ok()
    }

    /// Discards all not-yet-started jobs, returning how many were dropped.
    ///
    /// In-flight jobs still run to completion; their results stay in the
    /// finished channel and it is up to the caller to ignore them.
    pub fn clear_enqueued_jobs(&self) -> usize {
        let mut pending = self.shared.pending.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

impl<P: Send + 'static> Drop for JobManager<P> {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.work_available.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<P: Send + 'static>(shared: Arc<Shared<P>>, finished_tx: Sender<P>) {
    loop {
        let mut job = {
            let mut pending = shared.pending.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(job) = pending.pop_front() {
                    break job;
                }
                shared.work_available.wait(&mut pending);
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.execute()));
        let product = match outcome {
            Ok(()) => job.product(),
            Err(_) => {
                warn!("worker job panicked; delivering failure product");
                job.failure_product()
            }
        };

        // The receiver only disappears when the manager is being dropped.
        if finished_tx.send(product).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver as GateReceiver;
    use std::time::{Duration, Instant};

    struct AddJob {
        a: i32,
        b: i32,
        result: Option<i32>,
    }

    impl Job for AddJob {
        type Product = i32;

        fn execute(&mut self) {
            self.result = Some(self.a + self.b);
        }

        fn product(self: Box<Self>) -> i32 {
            self.result.unwrap_or(-1)
        }

        fn failure_product(&self) -> i32 {
            -1
        }
    }

    struct PanicJob;

    impl Job for PanicJob {
        type Product = i32;

        fn execute(&mut self) {
            panic!("intentional test panic");
        }

        fn product(self: Box<Self>) -> i32 {
            0
        }

        fn failure_product(&self) -> i32 {
            -99
        }
    }

    struct GatedJob {
        gate: GateReceiver<()>,
        id: i32,
    }

    impl Job for GatedJob {
        type Product = i32;

        fn execute(&mut self) {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
        }

        fn product(self: Box<Self>) -> i32 {
            self.id
        }

        fn failure_product(&self) -> i32 {
            -1
        }
    }

    fn drain_until<P: Send + 'static>(manager: &JobManager<P>, count: usize) -> Vec<P> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < count && Instant::now() < deadline {
            while let Some(p) = manager.pop_finished_job() {
                out.push(p);
            }
            thread::sleep(Duration::from_millis(1));
        }
        out
    }

    #[test]
    fn test_enqueue_and_drain_all() {
        let manager: JobManager<i32> = JobManager::new(2).unwrap();
        for i in 0..10 {
            manager.enqueue_job(Box::new(AddJob {
                a: i,
                b: 100,
                result: None,
            }));
        }
        let mut results = drain_until(&manager, 10);
        results.sort_unstable();
        assert_eq!(results, (100..110).collect::<Vec<_>>());
        assert_eq!(manager.num_finished_jobs(), 0);
    }

    #[test]
    fn test_pop_finished_job_is_non_blocking_when_empty() {
        let manager: JobManager<i32> = JobManager::new(1).unwrap();
        assert_eq!(manager.num_finished_jobs(), 0);
        assert!(manager.pop_finished_job().is_none());
    }

    #[test]
    fn test_worker_panic_becomes_failure_product() {
        let manager: JobManager<i32> = JobManager::new(1).unwrap();
        manager.enqueue_job(Box::new(PanicJob));
        let results = drain_until(&manager, 1);
        assert_eq!(results, vec![-99]);

        // The worker survives the panic and keeps executing jobs.
        manager.enqueue_job(Box::new(AddJob {
            a: 1,
            b: 2,
            result: None,
        }));
        let results = drain_until(&manager, 1);
        assert_eq!(results, vec![3]);
    }

    #[test]
    fn test_clear_enqueued_jobs_drops_pending_only() {
        let manager: JobManager<i32> = JobManager::new(1).unwrap();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded(0);

        // The first job occupies the single worker until the gate opens.
        manager.enqueue_job(Box::new(GatedJob {
            gate: gate_rx.clone(),
            id: 1,
        }));
        // Give the worker time to pick it up before queueing the rest.
        thread::sleep(Duration::from_millis(50));

        for id in 2..=6 {
            manager.enqueue_job(Box::new(GatedJob {
                gate: gate_rx.clone(),
                id,
            }));
        }

        let dropped = manager.clear_enqueued_jobs();
        assert_eq!(dropped, 5);

        let _ = gate_tx.send(());
        let results = drain_until(&manager, 1);
        assert_eq!(results, vec![1]);
        assert!(manager.pop_finished_job().is_none());
    }

    #[test]
    fn test_manager_drop_joins_idle_workers() {
        let manager: JobManager<i32> = JobManager::new(4).unwrap();
        assert_eq!(manager.num_workers(), 4);
        drop(manager);
    }
}
