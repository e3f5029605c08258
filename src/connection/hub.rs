//! Hand-off of received messages from the delivery path to blocking readers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::message::Message;

#[derive(Debug)]
struct HubState {
    queue: VecDeque<Message>,
    closed: bool,
}

/// FIFO of completed messages with blocking, optionally bounded, pops.
///
/// The transport's delivery path pushes; any number of caller threads pop.
/// A closed hub still hands out what is queued, then returns `None` without
/// blocking.
#[derive(Debug)]
pub struct ReceiveHub {
    state: Mutex<HubState>,
    available: Condvar,
}

impl Default for ReceiveHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveHub {
    /// Create a hub in the closed state; [`ReceiveHub::open`] it when a
    /// connection attempt starts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                queue: VecDeque::new(),
                closed: true,
            }),
            available: Condvar::new(),
        }
    }

    /// Accept blocking readers again.
    pub fn open(&self) {
        self.state.lock().closed = false;
    }

    /// Wake every blocked reader; pops on an empty queue return at once.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Queue a message and wake one reader.
    pub fn push(&self, message: Message) {
        self.state.lock().queue.push_back(message);
        self.available.notify_one();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Pop without waiting.
    pub fn try_pop(&self) -> Option<Message> {
        self.state.lock().queue.pop_front()
    }

    /// Pop the oldest message, waiting while the queue is empty and the hub
    /// is open. `None` means the timeout elapsed or the hub closed.
    pub fn pop(&self, timeout: Option<Duration>) -> Option<Message> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.queue.pop_front() {
                return Some(message);
            }
            if state.closed {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        return state.queue.pop_front();
                    }
                }
                None => self.available.wait(&mut state),
            }
        }
    }
}
