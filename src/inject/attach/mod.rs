//! Debug Attacher: makes a running process open its inspector port.
//!
//! The mechanism is OS-specific and touches another process, so it sits
//! behind the narrow [`Attacher`] trait. The rest of the pipeline only sees
//! `attach(pid) -> Result<(), AttachError>`.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("failed to open process {pid}")]
    OpenProcess {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("process {pid} has not published its debug signal channel")]
    SignalChannelMissing {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("debug signal handler entry for process {pid} is null")]
    NullEntry { pid: u32 },

    #[error("failed to start the debug signal thread in process {pid}")]
    CreateThread {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to signal process {pid}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("attaching is not supported on this platform")]
    Unsupported,
}

/// Capability to switch on a target's debugger.
pub trait Attacher {
    fn attach(&self, pid: u32) -> Result<(), AttachError>;
}

/// The attacher for the current OS.
///
/// `warmup` is waited after the process is opened and before the debug
/// signal is sent, so a freshly started target has time to set up its
/// signal channel.
#[derive(Debug, Clone, Copy)]
pub struct PlatformAttacher {
    warmup: Duration,
}

impl PlatformAttacher {
    pub const fn new(warmup: Duration) -> Self {
        Self { warmup }
    }
}

impl Attacher for PlatformAttacher {
    fn attach(&self, pid: u32) -> Result<(), AttachError> {
        #[cfg(windows)]
        {
            windows::attach(pid, self.warmup)
        }
        #[cfg(unix)]
        {
            unix::attach(pid, self.warmup)
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = (pid, self.warmup);
            Err(AttachError::Unsupported)
        }
    }
}
