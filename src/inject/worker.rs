//! Injection worker: the single consumer of the Work Queue.
//!
//! Jobs run strictly one at a time in dequeue order. A failed job is
//! logged and dropped; the loop itself only stops on shutdown.

use super::attach::Attacher;
use super::sequencer::Sequencer;
use super::{InjectError, InjectionJob};
use crate::core::{Context, is_shutdown};
use crate::log;
use std::error::Error;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often an idle worker checks for shutdown.
const IDLE_POLL: Duration = Duration::from_millis(250);

pub struct Worker<A> {
    ctx: Context,
    sequencer: Sequencer<A>,
}

impl<A: Attacher> Worker<A> {
    pub fn new(ctx: Context, attacher: A, server_port: u16) -> Self {
        Self {
            ctx,
            sequencer: Sequencer::new(attacher, server_port),
        }
    }

    /// Run one job against the config snapshot current at this moment.
    pub fn run_job(&mut self, job: &InjectionJob) -> Result<(), InjectError> {
        let snapshot = self.ctx.snapshot();
        let result = self.sequencer.run(job, &snapshot, &self.ctx.styles);
        match &result {
            Ok(()) => log!("inject"; "injected into {} ({})", job.exe, job.pid),
            Err(e) => log!("inject"; "abandoned {} ({}): {}", job.exe, job.pid, describe(e)),
        }
        result
    }

    /// Process queued jobs until shutdown.
    pub fn run(mut self) {
        while !is_shutdown() {
            if let Some(job) = self.ctx.queue.dequeue_timeout(IDLE_POLL) {
                let _ = self.run_job(&job);
            }
        }
    }

    /// Process whatever is queued right now, then return.
    pub fn drain(&mut self) -> usize {
        let mut processed = 0;
        while let Some(job) = self.ctx.queue.dequeue_timeout(Duration::ZERO) {
            let _ = self.run_job(&job);
            processed += 1;
        }
        processed
    }

    pub fn sequencer(&self) -> &Sequencer<A> {
        &self.sequencer
    }
}

/// Spawn the worker on its own thread.
pub fn spawn<A>(worker: Worker<A>) -> std::io::Result<JoinHandle<()>>
where
    A: Attacher + Send + 'static,
{
    thread::Builder::new()
        .name("inject-worker".into())
        .spawn(move || worker.run())
}

/// Error message followed by its source chain.
pub fn describe(e: &dyn Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
