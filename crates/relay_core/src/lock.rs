//! Per-directory serialization of transaction work.
//!
//! Every project directory gets its own FIFO queue drained by a single
//! worker task, so work submitted for one directory runs strictly one item
//! at a time in submission order while different directories proceed
//! independently.
//!
//! ```text
//!   process(dir_a, t1) ─┐
//!   process(dir_a, t2) ─┼─> [queue dir_a] ─> worker: t1, t2, t4
//!   process(dir_b, t3) ─┼─> [queue dir_b] ─> worker: t3
//!   process(dir_a, t4) ─┘
//! ```
//!
//! The registry is an owned value: whoever processes transactions creates a
//! [`DirectoryLock`] and shares it. Queues live until [`DirectoryLock::shutdown`]
//! or until the lock is dropped; already queued work still runs to
//! completion. A queue opened for a directory after shutdown waits for the
//! previous worker to drain first, so one directory never has two jobs in
//! flight.

use crate::error::{CoreError, CoreResult};
use crate::fs::directory_key;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug)]
struct Queue {
    sender: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct Queues {
    open: HashMap<PathBuf, Queue>,
    /// Workers of closed queues that may still be running jobs.
    draining: HashMap<PathBuf, JoinHandle<()>>,
}

/// Registry of per-directory work queues.
#[derive(Debug, Default)]
pub struct DirectoryLock {
    queues: Mutex<Queues>,
}

impl DirectoryLock {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` behind all earlier work for `directory`.
    ///
    /// The returned ticket resolves to the task's output once it has run.
    /// Existing directories are keyed by their canonical path, others by
    /// their absolute path.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime or if the
    /// directory cannot be resolved.
    pub fn process<F, T>(&self, directory: &Path, task: F) -> CoreResult<DirectoryTicket<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = Handle::try_current()
            .map_err(|_| CoreError::invalid_operation("directory lock requires a tokio runtime"))?;
        let key = directory_key(directory)?;

        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = task.await;
            // The submitter may have dropped its ticket.
            let _ = tx.send(output);
        });

        let mut guard = self.queues.lock();
        let queues = &mut *guard;
        let queue = match queues.open.remove(&key) {
            Some(queue) => queue,
            None => {
                let previous = queues.draining.remove(&key);
                spawn_worker(&handle, key.clone(), previous)
            }
        };

        let queue = match queue.sender.send(job) {
            Ok(()) => queue,
            Err(mpsc::error::SendError(job)) => {
                // The worker died with its runtime; start a fresh one.
                let queue = spawn_worker(&handle, key.clone(), None);
                queue.sender.send(job).map_err(|_| CoreError::QueueClosed)?;
                queue
            }
        };
        queues.open.insert(key, queue);

        Ok(DirectoryTicket { rx })
    }

    /// Returns the number of directories with an open queue.
    #[must_use]
    pub fn directories(&self) -> usize {
        self.queues.lock().open.len()
    }

    /// Closes every queue.
    ///
    /// Work already queued still runs. Later calls to
    /// [`process`](Self::process) open new queues that start once the
    /// closed queue for the same directory has drained.
    pub fn shutdown(&self) {
        let mut queues = self.queues.lock();
        queues.draining.retain(|_, worker| !worker.is_finished());

        let closed = std::mem::take(&mut queues.open);
        debug!(directories = closed.len(), "directory queues closed");
        for (key, queue) in closed {
            drop(queue.sender);
            queues.draining.insert(key, queue.worker);
        }
    }
}

fn spawn_worker(handle: &Handle, directory: PathBuf, previous: Option<JoinHandle<()>>) -> Queue {
    let (sender, mut rx) = mpsc::unbounded_channel::<Job>();
    debug!(dir = %directory.display(), "starting directory queue");

    let worker = handle.spawn(async move {
        if let Some(previous) = previous {
            if let Err(e) = previous.await {
                error!(dir = %directory.display(), error = %e, "previous queue worker failed");
            }
        }
        while let Some(job) = rx.recv().await {
            // Run each job as its own task so a panic cannot stop the queue.
            if let Err(e) = tokio::spawn(job).await {
                error!(dir = %directory.display(), error = %e, "queued task failed");
            }
        }
        debug!(dir = %directory.display(), "directory queue drained");
    });

    Queue { sender, worker }
}

/// Completion handle for work queued with [`DirectoryLock::process`].
#[derive(Debug)]
#[must_use = "a ticket does nothing unless awaited"]
pub struct DirectoryTicket<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for DirectoryTicket<T> {
    type Output = CoreResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| CoreError::QueueClosed))
    }
}
