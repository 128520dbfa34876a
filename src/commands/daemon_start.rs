use anyhow::Result;
use std::thread;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::daemon::config::load_config;
use crate::daemon::history;
use crate::daemon::lifecycle::LifecycleService;
use crate::daemon::paths::resolve_paths;
use crate::daemon::run_loop::faturas_mode_label;
use crate::daemon::state::{DaemonStatus, StateStore};
use crate::daemon::audit;
use crate::error::ExtratorError;

/// Idempotent start: a running daemon is nudged with a force-run signal
/// instead of a second spawn; otherwise a fresh daemon process is spawned
/// and confirmed alive after a short grace period.
pub fn run(include_faturas_graphql: bool) -> Result<CommandReport> {
    let mut report = CommandReport::new("start");
    let cfg = load_config()?;
    let paths = resolve_paths();
    let store = StateStore::new(paths.clone());
    store.ensure_daemon_dir()?;
    history::ensure_directories(&paths)?;
    let lifecycle = LifecycleService::new(&store);
    let mode = faturas_mode_label(include_faturas_graphql);

    if let Some(pid) = lifecycle.find_active_daemon() {
        store.sync_pid_marker(pid);
        store.request_force_run();
        let current = store.load_state();
        store.save_state(
            current.status,
            Some(pid),
            &format!("Daemon already running; immediate cycle requested. {mode}"),
            current.last_run_at.as_deref(),
            current.next_run_at.as_deref(),
        )?;
        report.detail(format!("daemon_pid={pid}"));
        report.detail("daemon already running; force-run signal registered");
        report.detail(format!("console_log={}", paths.console_log.display()));
        audit::append_event(&paths, "start", "nudged", &format!("pid={pid}"));
        return Ok(report);
    }

    store.clear_control_markers();
    let pid = lifecycle.spawn_daemon(include_faturas_graphql)?;
    store.sync_pid_marker(pid);
    store.save_state(
        DaemonStatus::Starting,
        Some(pid),
        &format!("Daemon process spawned. {mode}"),
        None,
        None,
    )?;

    thread::sleep(Duration::from_millis(cfg.timings.start_grace_ms));
    if !lifecycle.is_daemon_process(pid) {
        store.clear_if_exists(&paths.pid_file);
        store.clear_if_exists(&paths.stop_file);
        audit::append_event(&paths, "start", "failed", &format!("pid={pid}"));
        return Err(ExtratorError::DaemonStartFailed(paths.console_log.clone()).into());
    }

    report.detail(format!("daemon started pid={pid}"));
    report.detail(mode);
    report.detail(format!("console_log={}", paths.console_log.display()));
    audit::append_event(&paths, "start", "spawned", &format!("pid={pid}"));
    Ok(report)
}
