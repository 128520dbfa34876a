use anyhow::Result;

use crate::commands::CommandReport;
use crate::daemon::history;
use crate::daemon::lifecycle::LifecycleService;
use crate::daemon::paths::resolve_paths;
use crate::daemon::state::{DaemonStatus, StateStore};

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

/// Report pid, liveness and every persisted state field. A stale pid
/// marker pointing at a dead process is healed to STOPPED on the spot.
pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("status");
    let paths = resolve_paths();
    let store = StateStore::new(paths.clone());
    store.ensure_daemon_dir()?;
    history::ensure_directories(&paths)?;
    let lifecycle = LifecycleService::new(&store);

    let pid_marker = store.read_pid_marker();
    let active = lifecycle.find_active_daemon();
    if let Some(pid) = active {
        store.sync_pid_marker(pid);
    }
    let state = store.load_state();
    let alive = active.is_some();

    // A record that was never written reports by liveness alone.
    let status_label = if state.updated_at.is_empty() {
        if alive {
            DaemonStatus::Running.as_str()
        } else {
            DaemonStatus::Stopped.as_str()
        }
    } else {
        state.status.as_str()
    };

    report.detail(format!(
        "pid={}",
        active.map_or_else(|| "N/A".to_string(), |pid| pid.to_string())
    ));
    report.detail(format!("alive={}", if alive { "yes" } else { "no" }));
    report.detail(format!("state={status_label}"));
    report.detail(format!("updated_at={}", or_na(&state.updated_at)));
    report.detail(format!(
        "last_run_at={}",
        or_na(state.last_run_at.as_deref().unwrap_or(""))
    ));
    report.detail(format!(
        "next_run_at={}",
        or_na(state.next_run_at.as_deref().unwrap_or(""))
    ));
    report.detail(format!("detail={}", or_na(&state.detail)));
    report.detail(format!("state_file={}", paths.state_file.display()));
    report.detail(format!("console_log={}", paths.console_log.display()));
    report.detail(format!("cycles_dir={}", paths.cycles_dir.display()));
    report.detail(format!("history_dir={}", paths.history_dir.display()));
    report.detail(format!(
        "reconciliation_dir={}",
        paths.reconciliation_dir.display()
    ));
    report.detail(format!("build={}", env!("BUILD_UUID")));

    if !alive && pid_marker.is_some() {
        store.save_state(
            DaemonStatus::Stopped,
            pid_marker,
            "Recorded pid is no longer alive.",
            state.last_run_at.as_deref(),
            state.next_run_at.as_deref(),
        )?;
        store.clear_if_exists(&paths.pid_file);
        report.detail("stale pid marker cleared; state corrected to STOPPED");
    }

    Ok(report)
}
