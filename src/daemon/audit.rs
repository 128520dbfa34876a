use crate::daemon::paths::DaemonPaths;
use crate::daemon::util::now_epoch_secs;
use serde::Serialize;
use std::fs;
use std::path::Path;

const MAX_AUDIT_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub message: String,
}

/// Append a lifecycle event to the daemon audit log. Failures are
/// swallowed: the audit log is an operator convenience, never a reason to
/// interrupt a control command or the loop.
pub fn append_event(paths: &DaemonPaths, phase: &str, status: &str, message: &str) {
    let event = AuditEvent {
        at_epoch_secs: now_epoch_secs().unwrap_or(0),
        phase: phase.to_string(),
        status: status.to_string(),
        message: message.replace(['\r', '\n'], " "),
    };

    let Ok(line) = serde_json::to_string(&event) else {
        return;
    };

    if fs::create_dir_all(&paths.daemon_dir).is_err() {
        return;
    }
    maybe_rotate_log(&paths.audit_log);

    use std::io::Write;
    if let Ok(mut file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.audit_log)
    {
        let _ = file.write_all(format!("{line}\n").as_bytes());
    }
}

fn maybe_rotate_log(path: &Path) {
    if let Ok(meta) = fs::metadata(path)
        && meta.len() >= MAX_AUDIT_LOG_SIZE
    {
        let backup = format!("{}.1", path.display());
        let _ = fs::rename(path, backup);
    }
}

#[cfg(test)]
mod tests {
    use super::append_event;
    use crate::daemon::paths::DaemonPaths;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn append_event_writes_one_json_line_per_call() {
        let tmp = tempdir().expect("tempdir");
        let paths = DaemonPaths::new(tmp.path().join("daemon"), None);

        append_event(&paths, "daemon", "started", "pid=42");
        append_event(&paths, "cycle", "SUCCESS", "log=a.log");

        let raw = fs::read_to_string(&paths.audit_log).expect("audit log");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"phase\":\"daemon\""));
        assert!(lines[1].contains("\"status\":\"SUCCESS\""));
    }
}
