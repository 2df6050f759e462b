//! # Context Pool
//!
//! A fixed set of worker threads. Each one drives a current-thread tokio
//! runtime with a `LocalSet`, so a future handed to [`ContextPool::spawn_pinned`]
//! runs start to finish on a single thread: one logical execution context.
//! The future does not need to be `Send`.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use futures_util::future::{FutureExt, LocalBoxFuture};
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

use super::errors::{RuntimeError, RuntimeResult};

type Job = Box<dyn FnOnce() -> LocalBoxFuture<'static, ()> + Send>;

struct Worker {
    jobs: mpsc::UnboundedSender<Job>,
    thread: Option<JoinHandle<()>>,
}

/// Pool of pinned execution contexts
pub struct ContextPool {
    workers: Vec<Worker>,
    next: AtomicUsize,
}

impl ContextPool {
    /// Start `size` worker threads
    pub fn new(size: usize) -> RuntimeResult<Self> {
        if size == 0 {
            return Err(RuntimeError::NoWorkers);
        }
        let workers = (0..size)
            .map(Self::start_worker)
            .collect::<RuntimeResult<Vec<_>>>()?;
        Ok(Self {
            workers,
            next: AtomicUsize::new(0),
        })
    }

    fn start_worker(index: usize) -> RuntimeResult<Worker> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();

        let thread = thread::Builder::new()
            .name(format!("docflow-ctx-{index}"))
            .spawn(move || {
                let local = LocalSet::new();
                local.block_on(&runtime, async move {
                    while let Some(job) = rx.recv().await {
                        tokio::task::spawn_local(job());
                    }
                });
                // Let in-flight executions finish once no new work can arrive
                runtime.block_on(local);
            })?;

        Ok(Worker {
            jobs,
            thread: Some(thread),
        })
    }

    /// Number of worker contexts
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run the future produced by `f` on one worker context, round-robin.
    ///
    /// `f` itself is called on the worker, so the future may hold `!Send`
    /// state. The returned receiver yields its output.
    pub fn spawn_pinned<F, Fut>(&self, f: F) -> RuntimeResult<oneshot::Receiver<Fut::Output>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + 'static,
        Fut::Output: Send + 'static,
    {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        let (done, output) = oneshot::channel();
        let job: Job = Box::new(move || {
            let fut = f();
            async move {
                let _ = done.send(fut.await);
            }
            .boxed_local()
        });
        self.workers[index]
            .jobs
            .send(job)
            .map_err(|_| RuntimeError::ContextGone(index))?;
        Ok(output)
    }

    /// Stop accepting work and wait for every worker to drain
    pub fn shutdown(mut self) {
        self.join_all();
    }

    fn join_all(&mut self) {
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .drain(..)
            .filter_map(|mut worker| {
                drop(worker.jobs);
                worker.thread.take()
            })
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("execution context panicked");
            }
        }
    }
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("size", &self.workers.len())
            .finish()
    }
}
