//! Deferred task queue
//!
//! Negotiation operations need the local DTLS fingerprint, which the media
//! endpoint produces asynchronously after construction. Until it arrives the
//! queue is *closed* and holds at most one submitted task. Once opened, the
//! held task runs and every later submission runs immediately, in order.
//!
//! The application is expected to wait for each operation's result before
//! starting the next one, so a second submission while closed is a contract
//! violation and panics.

use std::collections::VecDeque;

use tracing::trace;

/// A unit of deferred work over state `S`
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Number of tasks that may wait for the gate to open
const CAPACITY: usize = 1;

/// Single-slot gate in front of the negotiation state
pub struct DeferredTaskQueue<S> {
    open: bool,
    pending: VecDeque<Task<S>>,
}

impl<S> DeferredTaskQueue<S> {
    /// Create a closed queue
    pub fn new() -> Self {
        Self {
            open: false,
            pending: VecDeque::with_capacity(CAPACITY),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Number of tasks waiting for the gate
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Run `task` now if open, otherwise hold it
    ///
    /// # Panics
    ///
    /// Panics if the queue is closed and already holds a task.
    pub fn submit(&mut self, state: &mut S, task: Task<S>) {
        if self.open {
            task(state);
            return;
        }

        assert!(
            self.pending.len() < CAPACITY,
            "operation submitted while another is still waiting for the DTLS fingerprint"
        );
        trace!("Deferring operation until the DTLS fingerprint is known");
        self.pending.push_back(task);
    }

    /// Open the gate and run held tasks in submission order
    ///
    /// Opening an already open queue does nothing.
    pub fn open(&mut self, state: &mut S) {
        if self.open {
            return;
        }
        self.open = true;
        while let Some(task) = self.pending.pop_front() {
            task(state);
        }
    }
}

impl<S> Default for DeferredTaskQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(value: i32) -> Task<Vec<i32>> {
        Box::new(move |log: &mut Vec<i32>| log.push(value))
    }

    #[test]
    fn test_task_waits_for_open() {
        let mut queue = DeferredTaskQueue::new();
        let mut log = Vec::new();

        queue.submit(&mut log, push(1));
        assert!(log.is_empty());
        assert_eq!(queue.pending_len(), 1);

        queue.open(&mut log);
        assert_eq!(log, vec![1]);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_runs_synchronously_once_open() {
        let mut queue = DeferredTaskQueue::new();
        let mut log = Vec::new();
        queue.open(&mut log);

        queue.submit(&mut log, push(1));
        queue.submit(&mut log, push(2));
        assert_eq!(log, vec![1, 2]);
    }

    #[test]
    fn test_open_twice_is_harmless() {
        let mut queue = DeferredTaskQueue::new();
        let mut log = Vec::new();
        queue.submit(&mut log, push(7));
        queue.open(&mut log);
        queue.open(&mut log);
        assert_eq!(log, vec![7]);
    }

    #[test]
    #[should_panic(expected = "waiting for the DTLS fingerprint")]
    fn test_second_submission_while_closed_panics() {
        let mut queue = DeferredTaskQueue::new();
        let mut log = Vec::new();
        queue.submit(&mut log, push(1));
        queue.submit(&mut log, push(2));
    }
}
