use anyhow::Result;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::daemon::audit;
use crate::daemon::config::load_config;
use crate::daemon::history;
use crate::daemon::lifecycle::LifecycleService;
use crate::daemon::paths::resolve_paths;
use crate::daemon::state::{DaemonStatus, StateStore};
use crate::error::ExtratorError;

/// Stop every discovered daemon process: stop signal first so the loop
/// can exit at a marker poll, then the graceful-then-forced termination
/// sequence. Survivors after escalation are an explicit failure.
pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("stop");
    let cfg = load_config()?;
    let paths = resolve_paths();
    let store = StateStore::new(paths.clone());
    store.ensure_daemon_dir()?;
    history::ensure_directories(&paths)?;
    let lifecycle = LifecycleService::new(&store);

    let targets = lifecycle.find_stop_targets();
    if targets.is_empty() {
        store.clear_control_markers();
        store.save_state(DaemonStatus::Stopped, None, "Daemon was not running.", None, None)?;
        report.detail("daemon was not running");
        return Ok(report);
    }

    let pid = targets[0];
    store.sync_pid_marker(pid);
    store.request_stop();
    store.save_state(
        DaemonStatus::Stopping,
        Some(pid),
        &format!("Stop requested; target processes: {}", targets.len()),
        None,
        None,
    )?;

    let survivors = lifecycle.terminate(
        &targets,
        Duration::from_secs(cfg.timings.stop_grace_secs),
        Duration::from_secs(cfg.timings.kill_wait_secs),
    );
    if !survivors.is_empty() {
        store.sync_pid_marker(survivors[0]);
        store.save_state(
            DaemonStatus::Stopping,
            Some(survivors[0]),
            &format!("Stop requested, but processes are still alive: {survivors:?}"),
            None,
            None,
        )?;
        audit::append_event(&paths, "stop", "failed", &format!("survivors={survivors:?}"));
        return Err(ExtratorError::DaemonStopIncomplete(survivors).into());
    }

    store.clear_control_markers();
    store.save_state(
        DaemonStatus::Stopped,
        Some(pid),
        "Daemon stopped by stop command.",
        None,
        None,
    )?;
    report.detail(format!("stopped daemon pid={pid}"));
    if targets.len() > 1 {
        report.detail(format!("stopped {} daemon processes: {targets:?}", targets.len()));
    }
    audit::append_event(&paths, "stop", "ok", &format!("pids={targets:?}"));
    Ok(report)
}
