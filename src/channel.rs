//! Work channel between the request generator and allocator workers.
//!
//! A blocking, order-preserving, multi-producer/multi-consumer FIFO of
//! [`Job`] values. Receivers park on a condition variable when the queue is
//! empty; with a bound set, senders park when it is full, so swapping in a
//! bounded queue gives backpressure without touching callers.
//!
//! Shutdown is cooperative on two levels: the orchestrator enqueues one
//! [`Job::Shutdown`] per worker after the generator finishes (FIFO order
//! guarantees no sentinel overtakes real work), and [`WorkQueue::disconnect`]
//! wakes every parked thread so an abandoned run unwinds cleanly instead of
//! hanging.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex};

use crate::request::Job;

/// The channel was disconnected while sending or receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work queue disconnected")
    }
}

impl std::error::Error for Disconnected {}

#[derive(Debug)]
struct QueueState {
    items: VecDeque<Job>,
    capacity: Option<usize>,
    disconnected: bool,
}

/// Blocking MPMC FIFO of jobs. Share via `Arc`.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl WorkQueue {
    /// Queue with no bound; `send` never blocks.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Queue holding at most `capacity` jobs; `send` blocks while full.
    pub fn bounded(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity.max(1)))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                capacity,
                disconnected: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueue a job, blocking while a bounded queue is full.
    pub fn send(&self, job: Job) -> Result<(), Disconnected> {
        let mut st = self.state.lock().unwrap();
        loop {
            if st.disconnected {
                return Err(Disconnected);
            }
            let full = st.capacity.is_some_and(|cap| st.items.len() >= cap);
            if !full {
                break;
            }
            st = self.not_full.wait(st).unwrap();
        }
        st.items.push_back(job);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue the oldest job, blocking while the queue is empty.
    ///
    /// Jobs still enqueued when the queue is disconnected are drained before
    /// `Err(Disconnected)` is returned.
    pub fn recv(&self) -> Result<Job, Disconnected> {
        let mut st = self.state.lock().unwrap();
        loop {
            if let Some(job) = st.items.pop_front() {
                self.not_full.notify_one();
                return Ok(job);
            }
            if st.disconnected {
                return Err(Disconnected);
            }
            st = self.not_empty.wait(st).unwrap();
        }
    }

    /// Wake every parked sender and receiver; subsequent sends fail and
    /// receives fail once the backlog is drained.
    pub fn disconnect(&self) {
        let mut st = self.state.lock().unwrap();
        st.disconnected = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Jobs currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    /// True when no jobs are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
