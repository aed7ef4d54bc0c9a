//! Injection Sequencer: drives one job through the fixed step sequence.
//!
//! ```text
//! Attaching → LocatingPort → Connecting → Enabling → [SendingScript]
//!           → SendingStyle → Detaching → Done
//! ```
//!
//! Any fatal error ends in `Aborted`. The session is closed on every path
//! once it has been opened.

use super::attach::Attacher;
use super::discovery::Discovery;
use super::inspector::{Inspector, InspectorError, Transport};
use super::payload::{self, ClientOptions, METHOD_ENABLE, METHOD_EVALUATE};
use super::{InjectError, InjectionJob};
use crate::config::{Application, ServiceConfig};
use crate::style::StyleRepository;
use crate::{debug, log};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attaching,
    LocatingPort,
    Connecting,
    Enabling,
    SendingScript,
    SendingStyle,
    Detaching,
    Done,
    Aborted,
}

pub struct Sequencer<A> {
    attacher: A,
    /// Port of the style broadcast server, handed to the client bundle.
    server_port: u16,
    trace: Vec<Stage>,
}

impl<A: Attacher> Sequencer<A> {
    pub fn new(attacher: A, server_port: u16) -> Self {
        Self {
            attacher,
            server_port,
            trace: Vec::new(),
        }
    }

    /// Stages visited by the last run, in order.
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    /// Run one job against the given config snapshot.
    pub fn run(
        &mut self,
        job: &InjectionJob,
        config: &ServiceConfig,
        styles: &StyleRepository,
    ) -> Result<(), InjectError> {
        self.trace.clear();
        let result = self.drive(job, config, styles);
        let end = if result.is_ok() {
            Stage::Done
        } else {
            Stage::Aborted
        };
        self.enter(job, end);
        result
    }

    fn drive(
        &mut self,
        job: &InjectionJob,
        config: &ServiceConfig,
        styles: &StyleRepository,
    ) -> Result<(), InjectError> {
        let app = config.apps.by_exe(&job.exe)?;

        self.enter(job, Stage::Attaching);
        self.attacher.attach(job.pid)?;

        self.enter(job, Stage::LocatingPort);
        let discovery = Discovery::from_config(&config.inject)?;
        let (url, attempt) = discovery.locate()?;
        debug!("inject"; "found {} after {} attempt(s)", url, attempt);

        self.enter(job, Stage::Connecting);
        let mut session = Inspector::connect(&url, config.inject.reply_timeout())?;

        let result = self.converse(&mut session, job, app, styles);
        self.enter(job, Stage::Detaching);
        session.close();
        result
    }

    /// Request sequence over an open session.
    pub(crate) fn converse<T: Transport>(
        &mut self,
        session: &mut Inspector<T>,
        job: &InjectionJob,
        app: &Application,
        styles: &StyleRepository,
    ) -> Result<(), InjectError> {
        self.enter(job, Stage::Enabling);
        session.send(METHOD_ENABLE, None)?;

        let script = styles.get_script(app);
        if !script.is_empty() {
            self.enter(job, Stage::SendingScript);
            session.wait_reply()?;
            session.send(METHOD_EVALUATE, Some(payload::evaluate(&script)))?;
        }

        self.enter(job, Stage::SendingStyle);
        session.wait_reply()?;
        let bundle = payload::style_bundle(&ClientOptions {
            executable_name: &job.exe,
            pid: job.pid,
            remove_csp: job.remove_csp,
            port: self.server_port,
        });
        session.send(METHOD_EVALUATE, Some(payload::evaluate(&bundle)))?;

        match session.wait_reply() {
            Ok(reply) => {
                report_exception(job, &reply);
                Ok(())
            }
            // `_debugEnd` may tear the session down before the reply is sent.
            Err(InspectorError::SessionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn enter(&mut self, job: &InjectionJob, stage: Stage) {
        debug!("inject"; "{} ({}): {:?}", job.exe, job.pid, stage);
        self.trace.push(stage);
    }
}

/// Log an evaluation that threw inside the target.
fn report_exception(job: &InjectionJob, reply: &Value) {
    let details = reply
        .pointer("/result/exceptionDetails")
        .or_else(|| reply.get("error"));
    if let Some(details) = details {
        log!("inject"; "{} ({}) reported an error: {}", job.exe, job.pid, details);
    }
}
