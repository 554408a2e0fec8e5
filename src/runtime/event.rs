//! Completion signals for cross-queue ordering

use super::Queue;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Single-use marker recorded at a queue's current position
///
/// Once the recording queue reaches the marker the event fires. Any other
/// queue can [`block`](Event::block) on it, which establishes a
/// happens-before edge between the two queues without involving the host.
#[derive(Clone, Default)]
pub struct Event {
    inner: Arc<EventInner>,
}

#[derive(Default)]
struct EventInner {
    state: Mutex<EventState>,
    cond: Condvar,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum EventState {
    #[default]
    Created,
    Recorded,
    Fired,
}

impl Event {
    /// Create an unrecorded event
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the event at the current end of `queue`
    ///
    /// An event can be recorded only once.
    pub fn record(&self, queue: &Queue) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != EventState::Created {
                return Err(Error::InvalidArgument {
                    arg: "event",
                    reason: "completion signal already recorded".to_string(),
                });
            }
            *state = EventState::Recorded;
        }

        let inner = Arc::clone(&self.inner);
        log::trace!("record event on {}", queue.device());
        queue.submit(move || {
            *inner.state.lock() = EventState::Fired;
            inner.cond.notify_all();
        })
    }

    /// Make `queue` wait for this event before running later work
    ///
    /// Blocking on an event that was never recorded is a no-op.
    pub fn block(&self, queue: &Queue) -> Result<()> {
        if *self.inner.state.lock() == EventState::Created {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        log::trace!("block {} on event", queue.device());
        queue.submit(move || {
            let mut state = inner.state.lock();
            while *state != EventState::Fired {
                inner.cond.wait(&mut state);
            }
        })
    }

    /// True once the recording queue has reached the event
    pub fn query(&self) -> bool {
        *self.inner.state.lock() == EventState::Fired
    }

    /// Block the calling thread until the event fires
    ///
    /// Returns immediately for an unrecorded event.
    pub fn synchronize(&self) {
        let mut state = self.inner.state.lock();
        while *state == EventState::Recorded {
            self.inner.cond.wait(&mut state);
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}
