use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::daemon::paths::DaemonPaths;
use crate::daemon::util::{TIME_FORMAT, now_epoch_secs};
use crate::daemon::warn::{self, WarnEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DaemonStatus {
    Starting,
    Running,
    Stopping,
    #[default]
    Stopped,
    WaitingNextCycle,
    WaitingNextCycleWithError,
}

impl DaemonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonStatus::Starting => "STARTING",
            DaemonStatus::Running => "RUNNING",
            DaemonStatus::Stopping => "STOPPING",
            DaemonStatus::Stopped => "STOPPED",
            DaemonStatus::WaitingNextCycle => "WAITING_NEXT_CYCLE",
            DaemonStatus::WaitingNextCycleWithError => "WAITING_NEXT_CYCLE_WITH_ERROR",
        }
    }
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted daemon record, fully overwritten on every transition. The
/// single source of truth for `status` output.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DaemonState {
    pub status: DaemonStatus,
    pub pid: Option<u32>,
    pub detail: String,
    pub updated_at: String,
    pub last_run_at: Option<String>,
    pub next_run_at: Option<String>,
}

/// Owns the daemon control files: the persisted state record plus the
/// pid, stop and force-run markers. Marker semantics derive from file
/// existence; the payload is only a debugging aid.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: DaemonPaths,
}

impl StateStore {
    pub fn new(paths: DaemonPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DaemonPaths {
        &self.paths
    }

    pub fn ensure_daemon_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.paths.daemon_dir).with_context(|| {
            format!("failed to create {}", self.paths.daemon_dir.display())
        })
    }

    /// A missing state file means "never started"; unreadable or corrupt
    /// content degrades to the default record so a control command never
    /// crashes on a half-written file.
    pub fn load_state(&self) -> DaemonState {
        let file = &self.paths.state_file;
        if !file.exists() {
            return DaemonState::default();
        }

        let raw = match fs::read_to_string(file) {
            Ok(raw) => raw,
            Err(_) => return DaemonState::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                let timestamp = now_epoch_secs().unwrap_or(0);
                let backup = file.with_extension(format!("state.corrupt.{timestamp}"));
                let _ = fs::write(&backup, &raw);
                warn::emit(WarnEvent {
                    code: "STATE_CORRUPT",
                    stage: "state",
                    action: "load-state",
                    path: &file.display().to_string(),
                    err: &format!("{err:#}"),
                });
                DaemonState::default()
            }
        }
    }

    /// Full overwrite of the state record. A write failure is surfaced to
    /// the caller: a control command must know its transition was lost.
    pub fn save_state(
        &self,
        status: DaemonStatus,
        pid: Option<u32>,
        detail: &str,
        last_run_at: Option<&str>,
        next_run_at: Option<&str>,
    ) -> Result<()> {
        self.ensure_daemon_dir()?;
        let state = DaemonState {
            status,
            pid,
            detail: detail.to_string(),
            updated_at: Local::now().format(TIME_FORMAT).to_string(),
            last_run_at: last_run_at.map(ToOwned::to_owned),
            next_run_at: next_run_at.map(ToOwned::to_owned),
        };
        let data = serde_json::to_string_pretty(&state)?;
        fs::write(&self.paths.state_file, format!("{data}\n")).with_context(|| {
            format!("failed to write {}", self.paths.state_file.display())
        })
    }

    pub fn read_pid_marker(&self) -> Option<u32> {
        let raw = fs::read_to_string(&self.paths.pid_file).ok()?;
        raw.trim().parse::<u32>().ok()
    }

    pub fn read_pid_from_state(&self) -> Option<u32> {
        self.load_state().pid
    }

    pub fn sync_pid_marker(&self, pid: u32) {
        if let Err(err) = self
            .ensure_daemon_dir()
            .and_then(|()| Ok(fs::write(&self.paths.pid_file, format!("{pid}\n"))?))
        {
            warn::emit(WarnEvent {
                code: "PID_MARKER_WRITE_FAILED",
                stage: "state",
                action: "sync-pid-marker",
                path: &self.paths.pid_file.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }

    pub fn request_stop(&self) {
        self.write_marker(&self.paths.stop_file, "stop");
    }

    pub fn request_force_run(&self) {
        self.write_marker(&self.paths.force_run_file, "force-run");
    }

    pub fn stop_requested(&self) -> bool {
        self.paths.stop_file.exists()
    }

    pub fn force_run_requested(&self) -> bool {
        self.paths.force_run_file.exists()
    }

    pub fn clear_if_exists(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn::emit(WarnEvent {
                code: "MARKER_CLEAR_FAILED",
                stage: "state",
                action: "clear-marker",
                path: &path.display().to_string(),
                err: &format!("{err:#}"),
            }),
        }
    }

    pub fn clear_control_markers(&self) {
        self.clear_if_exists(&self.paths.pid_file);
        self.clear_if_exists(&self.paths.stop_file);
        self.clear_if_exists(&self.paths.force_run_file);
    }

    fn write_marker(&self, path: &Path, kind: &str) {
        let payload = format!("{kind}@{}\n", Local::now().format(TIME_FORMAT));
        if let Err(err) = self
            .ensure_daemon_dir()
            .and_then(|()| Ok(fs::write(path, payload)?))
        {
            warn::emit(WarnEvent {
                code: "MARKER_WRITE_FAILED",
                stage: "state",
                action: "write-marker",
                path: &path.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DaemonStatus, StateStore};
    use crate::daemon::paths::DaemonPaths;
    use std::fs;
    use tempfile::tempdir;

    fn store(dir: &std::path::Path) -> StateStore {
        StateStore::new(DaemonPaths::new(dir.join("daemon"), None))
    }

    #[test]
    fn missing_state_file_means_never_started() {
        let tmp = tempdir().expect("tempdir");
        let store = store(tmp.path());
        let state = store.load_state();
        assert_eq!(state.status, DaemonStatus::Stopped);
        assert!(state.pid.is_none());
        assert!(state.updated_at.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempdir().expect("tempdir");
        let store = store(tmp.path());
        store
            .save_state(
                DaemonStatus::WaitingNextCycle,
                Some(4242),
                "waiting",
                Some("2026-08-08 10:00:00"),
                Some("2026-08-08 10:30:00"),
            )
            .expect("save");

        let state = store.load_state();
        assert_eq!(state.status, DaemonStatus::WaitingNextCycle);
        assert_eq!(state.pid, Some(4242));
        assert_eq!(state.next_run_at.as_deref(), Some("2026-08-08 10:30:00"));
        assert!(!state.updated_at.is_empty());
    }

    #[test]
    fn corrupt_state_degrades_to_default_and_keeps_a_backup() {
        let tmp = tempdir().expect("tempdir");
        let store = store(tmp.path());
        store.ensure_daemon_dir().expect("dir");
        fs::write(&store.paths().state_file, "{not json").expect("write");

        let state = store.load_state();
        assert_eq!(state.status, DaemonStatus::Stopped);

        let backups: Vec<_> = fs::read_dir(&store.paths().daemon_dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("corrupt"))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn status_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&DaemonStatus::WaitingNextCycleWithError).expect("json");
        assert_eq!(json, "\"WAITING_NEXT_CYCLE_WITH_ERROR\"");
    }

    #[test]
    fn pid_marker_round_trip_and_garbage_rejection() {
        let tmp = tempdir().expect("tempdir");
        let store = store(tmp.path());
        assert!(store.read_pid_marker().is_none());

        store.sync_pid_marker(77);
        assert_eq!(store.read_pid_marker(), Some(77));

        fs::write(&store.paths().pid_file, "not-a-pid").expect("write");
        assert!(store.read_pid_marker().is_none());
    }

    #[test]
    fn control_markers_are_presence_based_and_consumable() {
        let tmp = tempdir().expect("tempdir");
        let store = store(tmp.path());
        assert!(!store.stop_requested());
        assert!(!store.force_run_requested());

        store.request_stop();
        store.request_force_run();
        assert!(store.stop_requested());
        assert!(store.force_run_requested());

        store.clear_control_markers();
        assert!(!store.stop_requested());
        assert!(!store.force_run_requested());
        // clearing again is a no-op
        store.clear_control_markers();
    }
}
