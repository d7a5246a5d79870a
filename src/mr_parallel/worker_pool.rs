use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_channel::{Receiver, Sender};
use futures_lite::future;
use uuid::Uuid;

use crate::common::Scheduler;
use crate::error::MrError;

type Job = Box<dyn FnOnce(&str) + Send + 'static>;

/// Fixed set of worker threads pulling jobs from a shared bounded queue.
pub struct WorkerPool {
    pub workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<WorkerPool, MrError> {
        if size == 0 {
            return Err(MrError::InvalidConfig(
                "worker pool needs at least one worker".into(),
            ));
        }

        let (sender, receiver) = async_channel::bounded(size);
        let receiver = Arc::new(receiver);
        let mut workers = Vec::with_capacity(size);

        for _ in 0..size {
            workers.push(Worker::new(Arc::clone(&receiver)));
        }

        Ok(WorkerPool {
            workers,
            sender: Some(sender),
        })
    }

    fn execute<F>(&self, f: F) -> Result<(), MrError>
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(MrError::PoolClosed)?;
        sender
            .send_blocking(Box::new(f))
            .map_err(|_| MrError::PoolClosed)
    }
}

impl Scheduler for WorkerPool {
    fn parallelism(&self) -> usize {
        self.workers.len()
    }

    fn run_tasks<T, R, F>(&self, tasks: Vec<T>, f: Arc<F>) -> Result<Vec<R>, MrError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let count = tasks.len();
        let (done_tx, done_rx) = async_channel::unbounded();

        for (index, task) in tasks.into_iter().enumerate() {
            let f = Arc::clone(&f);
            let done = done_tx.clone();
            self.execute(move |worker_id| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(task)))
                    .map_err(|_| worker_id.to_string());
                tracing::trace!(worker_id, index, "task finished");
                // The receiver only goes away if the caller already bailed out.
                let _ = done.send_blocking((index, outcome));
            })?;
        }
        drop(done_tx);

        let mut results: Vec<Option<R>> = (0..count).map(|_| None).collect();
        for _ in 0..count {
            let (index, outcome) =
                future::block_on(done_rx.recv()).map_err(|_| MrError::PoolClosed)?;
            let value = outcome.map_err(|worker| MrError::WorkerPanicked { worker })?;
            results[index] = Some(value);
        }

        Ok(results.into_iter().flatten().collect())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets every worker loop run out.
        drop(self.sender.take());
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!(worker_id = %worker.id, "worker thread panicked");
                }
            }
        }
    }
}

pub struct Worker {
    pub id: String,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(receiver: Arc<Receiver<Job>>) -> Worker {
        let id = Uuid::new_v4().to_string();
        let id_clone = id.clone();
        let thread = thread::spawn(move || loop {
            match future::block_on(receiver.recv()) {
                Ok(job) => {
                    job(&id_clone);
                }
                Err(_) => {
                    tracing::trace!(worker_id = %id_clone, "job queue closed");
                    break;
                }
            };
        });

        Worker {
            id,
            thread: Some(thread),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn results_come_back_in_task_order() {
        let pool = WorkerPool::new(4).expect("Failed to build pool");

        let out = pool
            .run_tasks((0..100u64).collect(), Arc::new(|n: u64| n * n))
            .expect("tasks failed");

        assert_eq!(out, (0..100u64).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn tasks_spread_over_workers() {
        let pool = WorkerPool::new(3).expect("Failed to build pool");
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let seen_clone = Arc::clone(&seen);

        pool.run_tasks(
            (0..30).collect(),
            Arc::new(move |_: i32| {
                seen_clone
                    .lock()
                    .expect("poisoned")
                    .insert(thread::current().id());
                thread::sleep(std::time::Duration::from_millis(5));
            }),
        )
        .expect("tasks failed");

        assert!(seen.lock().expect("poisoned").len() > 1);
    }

    #[test]
    fn a_panicking_task_is_reported() {
        let pool = WorkerPool::new(2).expect("Failed to build pool");

        let err = pool
            .run_tasks(
                vec![1, 2, 3],
                Arc::new(|n: i32| {
                    if n == 2 {
                        panic!("bad task");
                    }
                    n
                }),
            )
            .unwrap_err();

        assert!(matches!(err, MrError::WorkerPanicked { .. }));
        // the pool stays usable afterwards
        let out = pool
            .run_tasks(vec![5], Arc::new(|n: i32| n + 1))
            .expect("tasks failed");
        assert_eq!(out, vec![6]);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(MrError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_task_list() {
        let pool = WorkerPool::new(1).expect("Failed to build pool");
        let out: Vec<i32> = pool
            .run_tasks(Vec::<i32>::new(), Arc::new(|n: i32| n))
            .expect("tasks failed");
        assert!(out.is_empty());
    }
}
