//! Process-event source.
//!
//! Polls the process table, diffs it against the previous snapshot and
//! queues an injection job for every new top-level process whose
//! executable is configured. The first snapshot is a baseline: processes
//! already running at startup are left alone.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(windows)]
mod windows;

use crate::core::{Context, is_shutdown};
use crate::inject::{InjectionJob, describe};
use crate::{debug, log};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Shutdown check granularity while waiting for the next poll.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("listing processes is not supported on this platform")]
    Unsupported,

    #[error("failed to read the process table")]
    Snapshot(#[source] io::Error),
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent: u32,
    /// File name of the executable, e.g. `Discord.exe`.
    pub exe: String,
    /// Full command line, where the platform exposes it.
    pub cmdline: Option<String>,
}

/// `ProcessCreated { pid, executableName }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCreated {
    pub pid: u32,
    pub exe: String,
}

/// Something that can list running processes.
pub trait ProcessSource {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>, ProcessError>;
}

/// The process table of the running system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessSource for SystemProcesses {
    fn snapshot(&mut self) -> Result<Vec<ProcessInfo>, ProcessError> {
        #[cfg(target_os = "linux")]
        return linux::snapshot().map_err(ProcessError::Snapshot);

        #[cfg(windows)]
        return windows::snapshot().map_err(ProcessError::Snapshot);

        #[cfg(not(any(target_os = "linux", windows)))]
        Err(ProcessError::Unsupported)
    }
}

/// A helper process of the embedded runtime rather than the application.
///
/// Helpers are started by the main process with the same executable, and
/// carry a `--type=` switch (renderer, gpu-process, ...).
pub fn is_child(info: &ProcessInfo, by_pid: &FxHashMap<u32, &ProcessInfo>) -> bool {
    if info
        .cmdline
        .as_deref()
        .is_some_and(|cmdline| cmdline.contains("--type="))
    {
        return true;
    }
    by_pid
        .get(&info.parent)
        .is_some_and(|parent| parent.pid != info.pid && parent.exe.eq_ignore_ascii_case(&info.exe))
}

pub struct ProcessWatcher<S> {
    source: S,
    /// Pids seen in the previous snapshot. `None` until the baseline.
    known: Option<FxHashSet<u32>>,
}

impl<S: ProcessSource> ProcessWatcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            known: None,
        }
    }

    /// Take a snapshot and return the top-level processes that appeared
    /// since the previous one.
    pub fn poll(&mut self) -> Result<Vec<ProcessCreated>, ProcessError> {
        let processes = self.source.snapshot()?;
        let current: FxHashSet<u32> = processes.iter().map(|p| p.pid).collect();

        let Some(known) = self.known.replace(current) else {
            debug!("process"; "baseline of {} processes", processes.len());
            return Ok(Vec::new());
        };

        let by_pid: FxHashMap<u32, &ProcessInfo> = processes.iter().map(|p| (p.pid, p)).collect();
        let created = processes
            .iter()
            .filter(|p| !known.contains(&p.pid))
            .filter(|p| !is_child(p, &by_pid))
            .map(|p| ProcessCreated {
                pid: p.pid,
                exe: p.exe.clone(),
            })
            .collect();
        Ok(created)
    }

    /// Poll once and queue jobs for watched executables.
    ///
    /// Returns the number of jobs queued.
    pub fn tick(&mut self, ctx: &Context) -> Result<usize, ProcessError> {
        let created = self.poll()?;
        if created.is_empty() {
            return Ok(0);
        }

        let config = ctx.snapshot();
        let mut queued = 0;
        for process in created {
            let Ok(app) = config.apps.by_exe(&process.exe) else {
                continue;
            };
            log!("process"; "{} started ({})", process.exe, process.pid);
            ctx.queue
                .enqueue(InjectionJob::new(process.pid, process.exe, app.remove_csp));
            queued += 1;
        }
        Ok(queued)
    }

    /// Poll until shutdown. A failing snapshot is logged and retried.
    pub fn run(mut self, ctx: Context) {
        while !is_shutdown() {
            if let Err(e) = self.tick(&ctx) {
                log!("process"; "{}", describe(&e));
            }
            let deadline = Instant::now() + ctx.snapshot().watch.poll_interval();
            while !is_shutdown() && Instant::now() < deadline {
                thread::sleep(SHUTDOWN_POLL.min(deadline.saturating_duration_since(Instant::now())));
            }
        }
    }
}

/// Take the baseline snapshot, then poll on a background thread.
///
/// Fails right away if the platform cannot list processes.
pub fn spawn<S>(mut watcher: ProcessWatcher<S>, ctx: Context) -> anyhow::Result<JoinHandle<()>>
where
    S: ProcessSource + Send + 'static,
{
    watcher.poll()?;
    let handle = thread::Builder::new()
        .name("process-watcher".into())
        .spawn(move || watcher.run(ctx))?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, ServiceConfig};
    use std::collections::VecDeque;

    /// Replays a fixed list of snapshots.
    struct ScriptedTable(VecDeque<Vec<ProcessInfo>>);

    impl ProcessSource for ScriptedTable {
        fn snapshot(&mut self) -> Result<Vec<ProcessInfo>, ProcessError> {
            self.0
                .pop_front()
                .ok_or_else(|| ProcessError::Snapshot(io::Error::other("exhausted")))
        }
    }

    fn proc(pid: u32, parent: u32, exe: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            parent,
            exe: exe.into(),
            cmdline: None,
        }
    }

    fn watcher(tables: Vec<Vec<ProcessInfo>>) -> ProcessWatcher<ScriptedTable> {
        ProcessWatcher::new(ScriptedTable(tables.into()))
    }

    fn context() -> Context {
        let config = ServiceConfig::from_content(
            "[[app]]\nexe = \"app.exe\"\ndirectory = \"app\"\nremove_csp = true\n",
        )
        .unwrap();
        Context::from_config(ConfigPaths::new("/nonexistent"), config)
    }

    #[test]
    fn test_baseline_is_not_reported() {
        let mut w = watcher(vec![vec![proc(10, 1, "app.exe")], vec![proc(10, 1, "app.exe")]]);
        assert!(w.poll().unwrap().is_empty());
        assert!(w.poll().unwrap().is_empty());
    }

    #[test]
    fn test_new_process_is_reported() {
        let mut w = watcher(vec![
            vec![proc(1, 0, "init")],
            vec![proc(1, 0, "init"), proc(20, 1, "app.exe")],
        ]);
        w.poll().unwrap();
        assert_eq!(
            w.poll().unwrap(),
            vec![ProcessCreated {
                pid: 20,
                exe: "app.exe".into()
            }]
        );
    }

    #[test]
    fn test_helpers_are_skipped() {
        let mut renderer = proc(32, 1, "other.exe");
        renderer.cmdline = Some("other.exe --type=renderer".into());
        let mut w = watcher(vec![
            vec![proc(1, 0, "init")],
            vec![
                proc(1, 0, "init"),
                proc(30, 1, "app.exe"),
                proc(31, 30, "app.exe"),
                renderer,
            ],
        ]);
        w.poll().unwrap();

        let created = w.poll().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].pid, 30);
    }

    #[test]
    fn test_reused_pid_after_exit() {
        let mut w = watcher(vec![
            vec![proc(40, 1, "app.exe")],
            vec![],
            vec![proc(40, 1, "app.exe")],
        ]);
        w.poll().unwrap();
        assert!(w.poll().unwrap().is_empty());
        assert_eq!(w.poll().unwrap().len(), 1);
    }

    #[test]
    fn test_tick_queues_only_watched() {
        let ctx = context();
        let mut w = watcher(vec![
            vec![],
            vec![proc(50, 1, "app.exe"), proc(51, 1, "unrelated.exe")],
        ]);

        assert_eq!(w.tick(&ctx).unwrap(), 0);
        assert_eq!(w.tick(&ctx).unwrap(), 1);
        assert_eq!(
            ctx.queue.dequeue_timeout(Duration::ZERO),
            Some(InjectionJob::new(50, "app.exe", true))
        );
        assert!(ctx.queue.is_empty());
    }

    #[test]
    fn test_snapshot_failure_is_reported() {
        let mut w = watcher(vec![]);
        assert!(matches!(w.poll(), Err(ProcessError::Snapshot(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_snapshot_contains_self() {
        let table = SystemProcesses.snapshot().unwrap();
        let me = std::process::id();
        assert!(table.iter().any(|p| p.pid == me));
    }
}
