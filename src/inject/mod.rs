//! Instrumentation pipeline.
//!
//! ```text
//! process watcher ──▶ WorkQueue ──▶ Worker ──▶ Sequencer
//!                                                ├── Attacher   (debug signal)
//!                                                ├── Discovery  (GET /json/list)
//!                                                └── Inspector  (websocket, FrameAssembler)
//! ```

pub mod attach;
mod discovery;
mod frame;
mod inspector;
mod payload;
mod queue;
mod sequencer;
mod worker;


pub use attach::{AttachError, Attacher, PlatformAttacher};
pub use discovery::{Discovery, DiscoveryError};
pub use frame::{FrameAssembler, FrameState, Incoming};
pub use inspector::{Inspector, InspectorError, Transport, WsTransport};
pub use queue::WorkQueue;
pub use sequencer::{Sequencer, Stage};
pub use worker::{Worker, describe, spawn};

use crate::config::LookupError;
use thiserror::Error;

/// A newly detected process waiting to be injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionJob {
    pub pid: u32,
    pub exe: String,
    pub remove_csp: bool,
}

impl InjectionJob {
    pub fn new(pid: u32, exe: impl Into<String>, remove_csp: bool) -> Self {
        Self {
            pid,
            exe: exe.into(),
            remove_csp,
        }
    }
}

/// Why a single job was abandoned.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Attach(#[from] AttachError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Inspector(#[from] InspectorError),
}

/// An incoming frame or message that could not be decoded.
///
/// Never fatal: the offending data is logged and skipped.
#[derive(Debug, Error)]
pub enum ProtocolDecodeError {
    #[error("invalid frame header: {0}")]
    Header(String),

    #[error("message of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: u64, max: usize },

    #[error("continuation frame without a message to continue")]
    UnexpectedContinuation,

    #[error("text message is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("malformed JSON message")]
    Json(#[from] serde_json::Error),
}
