//! Work Queue: unbounded FIFO of pending injection jobs.
//!
//! Producers never block. The single consumer blocks until a job arrives.
//! No priority and no dedup: a job enqueued twice is processed twice.

use super::InjectionJob;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::time::Duration;

#[derive(Debug)]
pub struct WorkQueue {
    tx: Sender<InjectionJob>,
    rx: Receiver<InjectionJob>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn enqueue(&self, job: InjectionJob) {
        crate::debug!("inject"; "queued {} ({})", job.exe, job.pid);
        // Cannot fail: the queue owns a receiver for its whole lifetime.
        let _ = self.tx.send(job);
    }

    /// Block until a job is available.
    pub fn dequeue(&self) -> Option<InjectionJob> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`. `None` when nothing arrived in time.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<InjectionJob> {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => Some(job),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
