use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

use super::debouncer::ChangeKind;
use crate::config::ConfigPaths;

/// A change the service reacts to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchEvent {
    ConfigChanged,
    /// Something under `styles/<dir>/` changed.
    StyleChanged { dir: String },
    /// Something under `scripts/<dir>/` changed.
    ScriptChanged { dir: String },
}

/// Map one path to the event it stands for, if any.
pub fn classify(path: &Path, paths: &ConfigPaths) -> Option<WatchEvent> {
    if path == paths.config_file {
        return Some(WatchEvent::ConfigChanged);
    }
    if let Some(dir) = first_component(path, &paths.styles) {
        return Some(WatchEvent::StyleChanged { dir });
    }
    if let Some(dir) = first_component(path, &paths.scripts) {
        return Some(WatchEvent::ScriptChanged { dir });
    }
    None
}

/// Classify a debounced batch. Each event is reported once, config first.
pub(super) fn classify_all(
    changes: FxHashMap<PathBuf, ChangeKind>,
    paths: &ConfigPaths,
) -> Vec<WatchEvent> {
    changes
        .keys()
        .filter_map(|path| classify(path, paths))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Name of the directory directly below `base` that contains `path`.
///
/// Files directly inside `base` do not belong to any application.
fn first_component(path: &Path, base: &Path) -> Option<String> {
    let rest = path.strip_prefix(base).ok()?;
    let mut components = rest.components();
    let Some(Component::Normal(dir)) = components.next() else {
        return None;
    };
    components.next()?;
    Some(dir.to_string_lossy().into_owned())
}
