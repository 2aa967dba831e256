//! Fixed-size worker pool fed by a bounded queue.
//!
//! Workers block on the shared queue and run each task's `process` exactly
//! once; the queue hands every item to a single consumer, so no task is ever
//! executed by two workers at the same time.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::queue::BoundedQueue;

/// A unit of work the pool knows how to run.
pub trait Task: Send + 'static {
    fn process(&self);
}

pub struct ThreadPool<T: Task> {
    queue: Arc<BoundedQueue<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Task> ThreadPool<T> {
    /// Starts `threads` workers sharing a queue of depth `queue_depth`.
    pub fn new(threads: usize, queue_depth: usize) -> Self {
        let queue = Arc::new(BoundedQueue::<T>::new(queue_depth));
        let workers = (0..threads.max(1))
            .map(|id| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    // `pop` returns None only once the queue is closed and
                    // drained, which is the shutdown signal.
                    while let Some(task) = queue.pop() {
                        task.process();
                    }
                    debug!(worker = id, "worker exiting");
                })
            })
            .collect();
        Self { queue, workers }
    }

    /// Enqueues a task. Returns `false` when the queue is full; the caller
    /// decides what to do with the rejected work.
    pub fn submit(&self, task: T) -> bool {
        self.queue.push(task).is_ok()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Closes the queue and joins every worker. Tasks already queued are
    /// still drained and run before the workers exit.
    pub fn shutdown(mut self) {
        self.queue.close();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl<T: Task> Drop for ThreadPool<T> {
    fn drop(&mut self) {
        // Wakes any worker still blocked in pop; shutdown() joins, plain
        // drop leaves the workers to finish on their own.
        self.queue.close();
    }
}
