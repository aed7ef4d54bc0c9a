//! Service wiring.
//!
//! ```text
//! main thread      waits for Ctrl+C, then tears everything down
//! tokio runtime    StyleServer actor, FileWatcher actor
//! inject-worker    Worker (one job at a time)
//! process-watcher  ProcessWatcher (polls the process table)
//! ```

use crate::core::{Context, register_shutdown, request_shutdown};
use crate::inject::{self, InjectionJob, PlatformAttacher, Worker};
use crate::process::{self, ProcessWatcher, SystemProcesses};
use crate::server::{ServerHandle, StyleServer, port_in_use};
use crate::watch::FileWatcher;
use crate::{debug, log};
use anyhow::{Context as _, Result, bail};
use crossbeam::channel::Receiver;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::Runtime;

/// How long the server actor gets to close its connections.
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Broadcast server and file watcher, running until Ctrl+C.
struct Broadcast {
    rt: Runtime,
    server: ServerHandle,
    server_task: tokio::task::JoinHandle<()>,
    shutdown_rx: Receiver<()>,
}

impl Broadcast {
    fn start(ctx: &Context) -> Result<Self> {
        check_discovery_port(ctx)?;

        let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);
        register_shutdown(shutdown_tx);

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;

        let (server, handle) = StyleServer::bind(ctx.clone())?;
        let watcher = FileWatcher::new(&ctx.config.paths().root)
            .context("Failed to watch config directory")?;

        let server_task = rt.spawn(server.run());
        rt.spawn(watcher.run(ctx.clone(), handle.clone()));

        Ok(Self {
            rt,
            server: handle,
            server_task,
            shutdown_rx,
        })
    }

    /// Block until shutdown is requested, then stop the actors.
    fn wait(self) {
        let _ = self.shutdown_rx.recv();
        debug!("restyle"; "shutdown signal received");

        self.rt.block_on(async {
            self.server.shutdown().await;
            let _ = tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, self.server_task).await;
        });
        self.rt.shutdown_timeout(SERVER_SHUTDOWN_TIMEOUT);
    }

    /// Stop without waiting for Ctrl+C.
    fn stop(self) {
        request_shutdown();
        self.wait();
    }
}

/// Every injection would reach whatever already listens on the
/// discovery port instead of the target.
fn check_discovery_port(ctx: &Context) -> Result<()> {
    let port = ctx.snapshot().inject.discovery_port;
    if port_in_use(port) {
        bail!(
            "port {} is already in use; close the program listening on it (another debugger?) and retry",
            port
        );
    }
    Ok(())
}

/// `restyle run`: inject into every watched application as it starts.
pub fn run(ctx: Context) -> Result<()> {
    let config = ctx.snapshot();
    if config.apps.is_empty() {
        log!("restyle"; "no applications configured in {}", ctx.config.paths().config_file.display());
    }

    let broadcast = Broadcast::start(&ctx)?;

    let worker = Worker::new(
        ctx.clone(),
        PlatformAttacher::new(config.inject.warmup()),
        broadcast.server.port(),
    );
    let worker = inject::spawn(worker).context("Failed to start injection worker")?;
    let watcher = process::spawn(ProcessWatcher::new(SystemProcesses), ctx.clone())
        .context("Failed to start process watcher")?;

    log!("restyle"; "watching {} application(s), press Ctrl+C to stop", config.apps.len());
    broadcast.wait();
    join("inject-worker", worker);
    join("process-watcher", watcher);
    Ok(())
}

/// `restyle inject`: inject into one running process, then keep serving
/// style updates to it.
pub fn inject_once(ctx: Context, pid: u32, exe: &str) -> Result<()> {
    let config = ctx.snapshot();
    let app = config.apps.by_exe(exe)?;
    let job = InjectionJob::new(pid, exe, app.remove_csp);

    let broadcast = Broadcast::start(&ctx)?;
    let mut worker = Worker::new(
        ctx.clone(),
        PlatformAttacher::new(config.inject.warmup()),
        broadcast.server.port(),
    );
    if let Err(e) = worker.run_job(&job) {
        broadcast.stop();
        return Err(e).with_context(|| format!("Failed to inject into {exe} ({pid})"));
    }

    log!("restyle"; "serving styles, press Ctrl+C to stop");
    broadcast.wait();
    Ok(())
}

fn join(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        log!("restyle"; "{} thread panicked", name);
    }
}
