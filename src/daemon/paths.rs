use std::env;
use std::path::PathBuf;

/// Filename prefix of the private runtime copies the daemon is spawned
/// from; also part of the process signature used to recognize a daemon.
pub const RUNTIME_BIN_PREFIX: &str = "extrator-daemon-runtime";

/// Internal subcommand the daemon process is invoked with. Present on the
/// command line of every legitimate daemon process.
pub const RUN_INTERNAL_MARKER: &str = "run-internal";

/// Every control, log and ledger path used by the loop daemon, resolved
/// once from the base directory.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub daemon_dir: PathBuf,
    pub state_file: PathBuf,
    pub pid_file: PathBuf,
    pub stop_file: PathBuf,
    pub force_run_file: PathBuf,
    pub console_log: PathBuf,
    pub cycles_dir: PathBuf,
    pub history_dir: PathBuf,
    pub reconciliation_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub audit_log: PathBuf,
}

impl DaemonPaths {
    pub fn new(daemon_dir: PathBuf, reconciliation_override: Option<PathBuf>) -> Self {
        let reconciliation_dir =
            reconciliation_override.unwrap_or_else(|| daemon_dir.join("reconciliacao"));
        Self {
            state_file: daemon_dir.join("loop_daemon.state"),
            pid_file: daemon_dir.join("loop_daemon.pid"),
            stop_file: daemon_dir.join("loop_daemon.stop"),
            force_run_file: daemon_dir.join("loop_daemon.force_run"),
            console_log: daemon_dir.join("loop_daemon_console.log"),
            cycles_dir: daemon_dir.join("ciclos"),
            history_dir: daemon_dir.join("history"),
            reconciliation_dir,
            runtime_dir: daemon_dir.join("runtime"),
            audit_log: daemon_dir.join("audit.log"),
            daemon_dir,
        }
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

pub fn resolve_paths() -> DaemonPaths {
    let daemon_dir =
        env_path("EXTRATOR_DAEMON_DIR").unwrap_or_else(|| PathBuf::from("logs").join("daemon"));
    let reconciliation_override = env_path("EXTRATOR_RECONCILIACAO_HISTORY_DIR");
    DaemonPaths::new(daemon_dir, reconciliation_override)
}

#[cfg(test)]
mod tests {
    use super::DaemonPaths;
    use std::path::PathBuf;

    #[test]
    fn layout_hangs_off_the_base_dir() {
        let paths = DaemonPaths::new(PathBuf::from("/srv/extrator/logs/daemon"), None);
        assert_eq!(
            paths.state_file,
            PathBuf::from("/srv/extrator/logs/daemon/loop_daemon.state")
        );
        assert_eq!(
            paths.cycles_dir,
            PathBuf::from("/srv/extrator/logs/daemon/ciclos")
        );
        assert_eq!(
            paths.reconciliation_dir,
            PathBuf::from("/srv/extrator/logs/daemon/reconciliacao")
        );
    }

    #[test]
    fn reconciliation_dir_override_is_respected() {
        let paths = DaemonPaths::new(
            PathBuf::from("logs/daemon"),
            Some(PathBuf::from("/audit/reconciliacao")),
        );
        assert_eq!(
            paths.reconciliation_dir,
            PathBuf::from("/audit/reconciliacao")
        );
        assert_eq!(paths.history_dir, PathBuf::from("logs/daemon/history"));
    }
}
