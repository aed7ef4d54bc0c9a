//! `/proc` process table.

use super::ProcessInfo;
use std::fs;
use std::io;
use std::path::Path;

pub fn snapshot() -> io::Result<Vec<ProcessInfo>> {
    let mut table = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) else {
            continue;
        };
        // Processes exit between listing and reading; skip them.
        if let Some(info) = read_process(pid, &entry.path()) {
            table.push(info);
        }
    }
    Ok(table)
}

fn read_process(pid: u32, dir: &Path) -> Option<ProcessInfo> {
    let parent = parse_parent(&fs::read_to_string(dir.join("stat")).ok()?)?;
    let argv = fs::read(dir.join("cmdline")).unwrap_or_default();
    let exe = fs::read_link(dir.join("exe"))
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .or_else(|| argv0_name(&argv))
        .or_else(|| {
            fs::read_to_string(dir.join("comm"))
                .ok()
                .map(|comm| comm.trim_end().to_string())
        })?;

    let cmdline = (!argv.is_empty()).then(|| join_args(&argv));
    Some(ProcessInfo {
        pid,
        parent,
        exe,
        cmdline,
    })
}

/// Parent pid from `/proc/<pid>/stat`.
///
/// The command name is in parentheses and may itself contain spaces and
/// parentheses, so fields are counted from the last `)`.
fn parse_parent(stat: &str) -> Option<u32> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(1)?.parse().ok()
}

fn argv0_name(argv: &[u8]) -> Option<String> {
    let first = argv.split(|&b| b == 0).next().filter(|arg| !arg.is_empty())?;
    let first = String::from_utf8_lossy(first);
    Path::new(first.as_ref())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn join_args(argv: &[u8]) -> String {
    argv.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parent() {
        assert_eq!(parse_parent("1234 (bash) S 42 1234 1234 0"), Some(42));
        assert_eq!(parse_parent("99 (we ird) (x)) R 7 99 99"), Some(7));
        assert_eq!(parse_parent("garbage"), None);
    }

    #[test]
    fn test_argv() {
        let argv = b"/opt/Discord/Discord\0--type=renderer\0\0";
        assert_eq!(argv0_name(argv).as_deref(), Some("Discord"));
        assert_eq!(join_args(argv), "/opt/Discord/Discord --type=renderer");
        assert_eq!(argv0_name(b""), None);
    }

    #[test]
    fn test_read_self() {
        let me = std::process::id();
        let info = read_process(me, Path::new(&format!("/proc/{me}"))).unwrap();
        assert_eq!(info.pid, me);
        assert!(!info.exe.is_empty());
        assert!(info.cmdline.is_some());
    }
}
