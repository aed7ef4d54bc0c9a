use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use super::classifier::classify_all;
use super::debouncer::{ChangeKind, DEBOUNCE_MS, Debouncer, is_temp_file};
use super::*;
use crate::config::ServiceConfig;
use crate::server::ServerMsg;

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn root_paths() -> ConfigPaths {
    ConfigPaths::new("/home/u/.restyle")
}

// =============================================================================
// Debouncer
// =============================================================================

#[test]
fn test_debouncer_empty() {
    let debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
    assert_eq!(debouncer.sleep_duration(), Duration::from_secs(86400));
}

#[test]
fn test_dedup_first_event_wins() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/tmp/a.css"], create_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.css"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.css", "/tmp/a.css"], modify_kind()));

    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.css")],
        ChangeKind::Created
    );
}

#[test]
fn test_atomic_save_is_restored() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/tmp/a.css"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.css"], create_kind()));

    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.css")],
        ChangeKind::Created
    );
}

#[test]
fn test_metadata_and_temp_files_ignored() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(
        vec!["/tmp/a.css"],
        notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
            notify::event::MetadataKind::Any,
        )),
    ));
    debouncer.add_event(&make_event(vec!["/tmp/.a.css.swp"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.css~"], modify_kind()));

    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_ready_after_quiet_period() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/tmp/a.css"], modify_kind()));
    assert!(debouncer.take_if_ready().is_none());

    std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 20));
    let changes = debouncer.take_if_ready().unwrap();
    assert_eq!(changes.len(), 1);
    assert!(debouncer.changes.is_empty());
    assert!(!debouncer.is_ready());
}

#[test]
fn test_is_temp_file() {
    assert!(is_temp_file(std::path::Path::new("/x/index.css.tmp")));
    assert!(is_temp_file(std::path::Path::new("/x/.#index.css")));
    assert!(!is_temp_file(std::path::Path::new("/x/index.css")));
}

// =============================================================================
// Classifier
// =============================================================================

#[test]
fn test_classify_paths() {
    let paths = root_paths();
    let root = &paths.root;

    assert_eq!(
        classify(&root.join("restyle.toml"), &paths),
        Some(WatchEvent::ConfigChanged)
    );
    assert_eq!(
        classify(&root.join("styles/discord/index.css"), &paths),
        Some(WatchEvent::StyleChanged {
            dir: "discord".into()
        })
    );
    assert_eq!(
        classify(&root.join("styles/discord/theme/extra.css"), &paths),
        Some(WatchEvent::StyleChanged {
            dir: "discord".into()
        })
    );
    assert_eq!(
        classify(&root.join("scripts/discord/index.js"), &paths),
        Some(WatchEvent::ScriptChanged {
            dir: "discord".into()
        })
    );
}

#[test]
fn test_classify_ignores_unrelated() {
    let paths = root_paths();
    let root = &paths.root;

    assert_eq!(classify(&root.join("notes.txt"), &paths), None);
    assert_eq!(classify(&root.join("styles/loose.css"), &paths), None);
    assert_eq!(classify(&root.join("styles/discord"), &paths), None);
    assert_eq!(classify(&PathBuf::from("/elsewhere/restyle.toml"), &paths), None);
}

#[test]
fn test_classify_all_dedups_and_orders() {
    let paths = root_paths();
    let root = &paths.root;
    let mut changes = rustc_hash::FxHashMap::default();
    changes.insert(root.join("styles/b/index.css"), ChangeKind::Modified);
    changes.insert(root.join("styles/b/extra.css"), ChangeKind::Created);
    changes.insert(root.join("styles/a/index.css"), ChangeKind::Modified);
    changes.insert(root.join("restyle.toml"), ChangeKind::Modified);
    changes.insert(root.join("unrelated"), ChangeKind::Removed);

    assert_eq!(
        classify_all(changes, &paths),
        vec![
            WatchEvent::ConfigChanged,
            WatchEvent::StyleChanged { dir: "a".into() },
            WatchEvent::StyleChanged { dir: "b".into() },
        ]
    );
}

// =============================================================================
// apply
// =============================================================================

struct Fixture {
    _dir: TempDir,
    ctx: Context,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let paths = ConfigPaths::new(dir.path());
    paths.bootstrap().unwrap();
    fs::create_dir_all(paths.styles.join("a")).unwrap();
    fs::write(paths.styles.join("a/index.css"), "a {}").unwrap();
    let content = "[[app]]\nexe = \"a.exe\"\ndirectory = \"a\"\n";
    fs::write(&paths.config_file, content).unwrap();

    let ctx = Context::from_config(paths, ServiceConfig::from_content(content).unwrap());
    Fixture { _dir: dir, ctx }
}

#[tokio::test]
async fn test_style_change_publishes_to_exe() {
    let fx = fixture();
    let (server, mut rx) = ServerHandle::detached(0);

    let event = WatchEvent::StyleChanged { dir: "a".into() };
    apply(event.clone(), &fx.ctx, &server).await;
    match rx.try_recv() {
        Ok(ServerMsg::Publish { exe, css }) => {
            assert_eq!(exe, "a.exe");
            assert_eq!(css, "a {}");
        }
        other => panic!("expected publish, got {other:?}"),
    }

    // same content again: nothing to publish
    apply(event.clone(), &fx.ctx, &server).await;
    assert!(rx.try_recv().is_err());

    fs::write(fx.ctx.styles.paths().styles.join("a/index.css"), "a { x: 1 }").unwrap();
    apply(event, &fx.ctx, &server).await;
    assert!(matches!(
        rx.try_recv(),
        Ok(ServerMsg::Publish { css, .. }) if css == "a { x: 1 }"
    ));
}

#[tokio::test]
async fn test_unknown_directory_is_ignored() {
    let fx = fixture();
    let (server, mut rx) = ServerHandle::detached(0);

    apply(WatchEvent::StyleChanged { dir: "zzz".into() }, &fx.ctx, &server).await;
    apply(WatchEvent::ScriptChanged { dir: "a".into() }, &fx.ctx, &server).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_config_change_reloads() {
    let fx = fixture();
    let (server, _rx) = ServerHandle::detached(0);
    let config_file = fx.ctx.config.paths().config_file.clone();

    fs::write(&config_file, "[[app]]\nexe = \"b.exe\"\ndirectory = \"b\"\n").unwrap();
    apply(WatchEvent::ConfigChanged, &fx.ctx, &server).await;
    assert!(fx.ctx.snapshot().apps.is_watched("b.exe"));

    fs::write(&config_file, "not toml [").unwrap();
    apply(WatchEvent::ConfigChanged, &fx.ctx, &server).await;
    assert!(fx.ctx.snapshot().apps.is_watched("b.exe"));
}

#[tokio::test]
async fn test_watcher_end_to_end() {
    let fx = fixture();
    let (server, mut rx) = ServerHandle::detached(0);
    let watcher = FileWatcher::new(&fx.ctx.config.paths().root).unwrap();
    let task = tokio::spawn(watcher.run(fx.ctx.clone(), server));

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(fx.ctx.styles.paths().styles.join("a/index.css"), "a { y: 2 }").unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert!(matches!(
        msg,
        Some(ServerMsg::Publish { exe, css }) if exe == "a.exe" && css == "a { y: 2 }"
    ));
    task.abort();
}
