//! Unix attach: `SIGUSR1` makes the embedded runtime open its inspector.

use super::AttachError;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::io;
use std::thread;
use std::time::Duration;

pub fn attach(pid: u32, warmup: Duration) -> Result<(), AttachError> {
    let target = i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| AttachError::OpenProcess {
            pid,
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

    // Signal 0: existence and permission check only.
    kill(target, None).map_err(|errno| AttachError::OpenProcess {
        pid,
        source: io::Error::from(errno),
    })?;

    thread::sleep(warmup);

    kill(target, Signal::SIGUSR1).map_err(|errno| AttachError::Signal {
        pid,
        source: io::Error::from(errno),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_missing_process() {
        // pid_max is far below i32::MAX on every supported system
        let err = attach(i32::MAX as u32, Duration::ZERO).unwrap_err();
        assert!(matches!(err, AttachError::OpenProcess { .. }));
    }

    #[test]
    fn test_attach_pid_out_of_range() {
        let err = attach(u32::MAX, Duration::ZERO).unwrap_err();
        assert!(matches!(err, AttachError::OpenProcess { .. }));
    }
}
