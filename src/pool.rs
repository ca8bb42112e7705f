//! Fixed-size cooperative worker pool.
//!
//! One mutex-guarded FIFO queue, one condition variable, one atomic stop
//! flag. Tasks never preempt each other; suspension only happens while a
//! worker waits on an empty queue. Deliberately not `rayon`: the scheduler
//! needs to submit a follow-up task in reaction to a sibling's completion,
//! a shape `rayon`'s data-parallel `par_iter` can't express directly.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

type Task = Box<dyn FnOnce() + Send>;

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    condvar: Condvar,
    stop: AtomicBool,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            stop: AtomicBool::new(false),
        });

        let workers = (0..size)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();

        Self { shared, workers }
    }

    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        self.shared.queue.lock().unwrap().push_back(Box::new(task));
        self.shared.condvar.notify_one();
    }

    pub fn shutdown(mut self) {
        self.shutdown_inner();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn shutdown_inner(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.condvar.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown_inner();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(task) = queue.pop_front() {
                    break Some(task);
                }
                if shared.stop.load(Ordering::Acquire) {
                    break None;
                }
                queue = shared.condvar.wait(queue).unwrap();
            }
        };

        match task {
            Some(task) => {
                // A panicking task must not take the worker thread down
                // with it; tasks are caught and reported, not propagated.
                let _ = catch_unwind(AssertUnwindSafe(task));
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_submitted_tasks() {
        let pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn panicking_task_does_not_stop_the_pool() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(|| panic!("boom"));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }
}
