use anyhow::Result;
use chrono::Duration as Interval;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::daemon::collab::{CommandCycleRunner, CommandReconciliation, CommandRecordCounter};
use crate::daemon::config::load_config;
use crate::daemon::history::HistoryWriter;
use crate::daemon::paths::resolve_paths;
use crate::daemon::run_loop::{CycleLoop, PollingWait};
use crate::daemon::state::StateStore;

/// Entry point of the spawned daemon process. Blocks inside the cycle
/// loop until a stop signal is honored.
pub fn run(include_faturas_graphql: bool) -> Result<CommandReport> {
    let mut report = CommandReport::new("run-internal");
    let cfg = load_config()?;
    let paths = resolve_paths();

    let store = StateStore::new(paths.clone());
    let history = HistoryWriter::new(
        paths,
        Box::new(CommandRecordCounter::new(cfg.commands.record_count.clone())),
    );
    let runner = CommandCycleRunner::new(cfg.commands.cycle.clone());
    let reconciliation = CommandReconciliation::new(cfg.commands.reconciliation.clone());
    let wait = PollingWait {
        poll: Duration::from_secs(cfg.timings.poll_secs),
    };

    CycleLoop::new(
        &store,
        &history,
        &runner,
        &reconciliation,
        &wait,
        Interval::minutes(cfg.timings.interval_minutes as i64),
    )
    .run(include_faturas_graphql)?;

    report.detail("daemon loop exited");
    Ok(report)
}
