//! File-watch source
//!
//! Watches the config directory and turns debounced changes into
//! reloads and style broadcasts.
//!
//! ```text
//! notify → Debouncer (timing) → classify (paths → WatchEvent) → apply
//! ```

mod classifier;
mod debouncer;

#[cfg(test)]
mod tests;

pub use classifier::{WatchEvent, classify};

use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::ConfigPaths;
use crate::core::Context;
use crate::inject::describe;
use crate::server::ServerHandle;
use crate::{debug, log};
use classifier::classify_all;
use debouncer::Debouncer;

/// File watcher actor
pub struct FileWatcher {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    /// Config layout with the root as notify reports it.
    paths: ConfigPaths,
    debouncer: Debouncer,
}

impl FileWatcher {
    /// Start watching `root` right away. Events buffer until `run`.
    pub fn new(root: &Path) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // notify reports canonical paths on some platforms
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        watcher.watch(&root, RecursiveMode::Recursive)?;
        debug!("watch"; "watching {}", root.display());

        Ok(Self {
            notify_rx,
            _watcher: watcher,
            paths: ConfigPaths::new(root),
            debouncer: Debouncer::new(),
        })
    }

    /// Run the actor event loop
    pub async fn run(self, ctx: Context, server: ServerHandle) {
        let Self {
            notify_rx,
            _watcher,
            paths,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(changes) = debouncer.take_if_ready() else {
                        continue;
                    };
                    for event in classify_all(changes, &paths) {
                        apply(event, &ctx, &server).await;
                    }
                }
            }
        }
    }
}

/// React to one classified change.
pub async fn apply(event: WatchEvent, ctx: &Context, server: &ServerHandle) {
    match event {
        WatchEvent::ConfigChanged => match ctx.config.reload() {
            Ok(true) => log!("config"; "reloaded ({} apps)", ctx.snapshot().apps.len()),
            Ok(false) => debug!("config"; "unchanged"),
            Err(e) => log!("config"; "reload failed, keeping previous: {}", describe(&e)),
        },
        WatchEvent::StyleChanged { dir } => {
            let config = ctx.snapshot();
            let app = match config.apps.by_directory(&dir) {
                Ok(app) => app,
                Err(e) => {
                    log!("watch"; "style changed: {}", e);
                    return;
                }
            };
            match ctx.styles.changed_style(app) {
                Some(css) => {
                    log!("watch"; "style changed: {}", app.exe);
                    server.publish(app.exe.as_str(), css).await;
                }
                None => debug!("watch"; "style unchanged: {}", app.exe),
            }
        }
        WatchEvent::ScriptChanged { dir } => {
            log!("watch"; "script changed in {}, applies on next injection", dir);
        }
    }
}
