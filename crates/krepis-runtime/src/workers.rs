// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed pool of worker threads fed through a channel.
//!
//! The pool is the canonical runtime-arguments global: a binary usually
//! sizes it from `available_parallelism` at startup and brings it up with
//! `Handle::init_with`, rather than baking the thread count into the
//! declaration.

use std::thread::{self, JoinHandle};

use krepis_core::boot::Subsystem;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Construction parameters for [`WorkerPool`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolArgs {
    /// Number of worker threads; clamped to at least one.
    pub threads: usize,
}

/// Fixed worker threads draining a shared job queue.
///
/// Teardown closes the queue, lets the workers finish whatever is still
/// queued, and joins them.
pub struct WorkerPool {
    sender: Option<flume::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Subsystem for WorkerPool {
    type Args = WorkerPoolArgs;

    fn create(args: &WorkerPoolArgs) -> Self {
        let threads = args.threads.max(1);
        let (sender, receiver) = flume::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(format!("krepis-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                });
            match worker {
                Ok(handle) => workers.push(handle),
                Err(e) => panic!("failed to spawn worker thread {index}: {e}"),
            }
        }
        log::info!("worker pool online with {threads} threads");
        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }
}

impl WorkerPool {
    /// Queues a job for the next free worker.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            if sender.send(Box::new(job)).is_err() {
                log::warn!("worker pool rejected a job during shutdown");
            }
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("a worker thread panicked during teardown");
            }
        }
        log::info!("worker pool drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};

    #[test]
    fn runs_every_submitted_job() {
        let pool = WorkerPool::create(&WorkerPoolArgs { threads: 3 });
        assert_eq!(pool.worker_count(), 3);

        let counter = Arc::new(AtomicUsize::new(0));
        let (done, results) = mpsc::channel::<()>();
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            let done = done.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::Relaxed);
                let _ = done.send(());
            });
        }
        drop(done);
        assert_eq!(results.iter().count(), 32);
        assert_eq!(counter.load(Ordering::Relaxed), 32);
    }

    #[test]
    fn teardown_finishes_queued_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::create(&WorkerPoolArgs { threads: 1 });
            for _ in 0..16 {
                let counter = Arc::clone(&counter);
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                });
            }
        }
        // The pool joined its workers on drop, so the queue is drained.
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn thread_count_is_clamped() {
        let pool = WorkerPool::create(&WorkerPoolArgs { threads: 0 });
        assert_eq!(pool.worker_count(), 1);
    }
}
