//! Ordered per-device execution queues
//!
//! Each queue is a single worker thread draining a FIFO channel, so work
//! submitted to one queue runs in submission order while distinct queues run
//! independently. A panicking task does not kill the worker; its message is
//! stored and reported by the next [`Queue::synchronize`].

use super::Device;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a device's execution queue
///
/// Cloning is cheap; all clones refer to the same worker.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    device: Device,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    progress: Arc<Progress>,
}

#[derive(Default)]
struct Progress {
    state: Mutex<ProgressState>,
    cond: Condvar,
}

#[derive(Default)]
struct ProgressState {
    submitted: u64,
    completed: u64,
    failure: Option<String>,
}

impl Queue {
    /// Start a queue for `device`
    pub(crate) fn new(device: Device) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let progress = Arc::new(Progress::default());
        let worker_progress = Arc::clone(&progress);

        let worker = thread::Builder::new()
            .name(format!("devcopy-{device}"))
            .spawn(move || {
                for task in receiver {
                    let outcome = catch_unwind(AssertUnwindSafe(task));
                    let mut state = worker_progress.state.lock();
                    state.completed += 1;
                    if let Err(payload) = outcome {
                        let reason = panic_message(payload.as_ref());
                        log::error!("task failed on {device}: {reason}");
                        state.failure.get_or_insert(reason);
                    }
                    worker_progress.cond.notify_all();
                }
            })
            .map_err(|e| Error::internal(format!("failed to start queue for {device}: {e}")))?;

        Ok(Self {
            inner: Arc::new(QueueInner {
                device,
                sender: Mutex::new(Some(sender)),
                worker_id: worker.thread().id(),
                worker: Mutex::new(Some(worker)),
                progress,
            }),
        })
    }

    /// Device this queue executes on
    #[inline]
    pub fn device(&self) -> Device {
        self.inner.device
    }

    /// Check whether two handles refer to the same queue
    #[inline]
    pub fn is_same(&self, other: &Queue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Enqueue `task` behind all previously submitted work
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        // Counter and channel are updated under one lock so the submission
        // order seen by `synchronize` matches the execution order.
        let sender = self.inner.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(self.closed());
        };
        self.inner.progress.state.lock().submitted += 1;
        if sender.send(Box::new(task)).is_err() {
            self.inner.progress.state.lock().submitted -= 1;
            return Err(self.closed());
        }
        Ok(())
    }

    /// Block the calling thread until all work submitted so far has run
    ///
    /// Returns the first task failure recorded since the last synchronize.
    pub fn synchronize(&self) -> Result<()> {
        if thread::current().id() == self.inner.worker_id {
            return Err(Error::internal(format!(
                "queue for {} synchronized from its own worker",
                self.inner.device
            )));
        }

        let progress = &self.inner.progress;
        let mut state = progress.state.lock();
        let target = state.submitted;
        while state.completed < target {
            progress.cond.wait(&mut state);
        }

        match state.failure.take() {
            Some(reason) => Err(Error::Queue {
                device: self.inner.device,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Number of tasks that have finished running
    pub fn completed(&self) -> u64 {
        self.inner.progress.state.lock().completed
    }

    fn closed(&self) -> Error {
        Error::Queue {
            device: self.inner.device,
            reason: "queue is shut down".to_string(),
        }
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.progress.state.lock();
        f.debug_struct("Queue")
            .field("device", &self.inner.device)
            .field("submitted", &state.submitted)
            .field("completed", &state.completed)
            .finish()
    }
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            // The last handle can be released by a task running on the worker.
            if thread::current().id() != self.worker_id {
                let _ = worker.join();
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
