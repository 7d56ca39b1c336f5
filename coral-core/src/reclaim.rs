//! Deferred destruction pool.
//!
//! Oversized sorted sets are handed here after they are fully unlinked from every live index,
//! so the worker threads never share reachable state with the event loop. Items carry no
//! ordering guarantee and completion is never awaited.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    ready: Condvar,
}

/// Fixed pool of destructor workers over one lock/condvar queue.
pub struct DeferredReclaimer {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl DeferredReclaimer {
    /// Spawns `threads` workers (clamped to at least one).
    ///
    /// # Panics
    ///
    /// Panics when the OS refuses to spawn a worker thread; that is a fatal resource error
    /// during process bootstrap.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
        });
        let workers = (0..threads.max(1))
            .map(|n| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("coral-reclaim-{n}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("spawning a reclaim worker must succeed at startup")
            })
            .collect();
        Self { shared, workers }
    }

    /// Enqueues fire-and-forget destructor work.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
        let mut state = self
            .shared
            .state
            .lock()
            .expect("reclaim queue lock is never poisoned");
        state.jobs.push_back(Box::new(job));
        drop(state);
        self.shared.ready.notify_one();
    }
}

impl Drop for DeferredReclaimer {
    fn drop(&mut self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .expect("reclaim queue lock is never poisoned");
            state.shutdown = true;
        }
        self.shared.ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl fmt::Debug for DeferredReclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredReclaimer")
            .field("workers", &self.workers.len())
            .finish()
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let mut state = shared
            .state
            .lock()
            .expect("reclaim queue lock is never poisoned");
        loop {
            if let Some(job) = state.jobs.pop_front() {
                drop(state);
                job();
                break;
            }
            if state.shutdown {
                return;
            }
            state = shared
                .ready
                .wait(state)
                .expect("reclaim queue lock is never poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DeferredReclaimer;
    use googletest::prelude::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[rstest]
    fn every_submitted_job_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = DeferredReclaimer::new(3);
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 100 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_that!(counter.load(Ordering::SeqCst), eq(100));
    }

    #[rstest]
    fn drop_drains_queued_work_or_exits_cleanly() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = DeferredReclaimer::new(1);
            for _ in 0..10 {
                let counter = Arc::clone(&counter);
                pool.submit(move || {
                    let _ = counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        // After drop returns all workers have exited; whatever ran was counted exactly once.
        assert_that!(counter.load(Ordering::SeqCst) <= 10, eq(true));
    }

    #[rstest]
    fn zero_thread_request_still_gets_one_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = DeferredReclaimer::new(0);
        let seen = Arc::clone(&counter);
        pool.submit(move || {
            let _ = seen.fetch_add(1, Ordering::SeqCst);
        });
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_that!(counter.load(Ordering::SeqCst), eq(1));
    }
}
