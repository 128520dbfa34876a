//! The long-lived behavior of the daemon process: run a cycle, reconcile,
//! record history, wait, react to control markers, forever — until a stop
//! marker is honored.

use anyhow::Result;
use chrono::{Duration as Interval, Local, NaiveDateTime};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::daemon::audit;
use crate::daemon::capture::CycleCapture;
use crate::daemon::collab::{
    CycleRunner, INTEGRITY_ALERT_MARKER, ReconciliationProcessor, ReconciliationSummary,
};
use crate::daemon::history::{self, HistoryWriter};
use crate::daemon::state::{DaemonStatus, StateStore};
use crate::daemon::util::TIME_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    StopRequested,
    ForceRunRequested,
    Elapsed,
}

pub trait WaitStrategy {
    fn wait(&self, next_run: NaiveDateTime, store: &StateStore) -> WaitOutcome;
}

/// Production wait: sleep in short slices, watching the control markers.
/// A force-run marker is deleted before it is honored so it can never
/// re-trigger on the following wait.
pub struct PollingWait {
    pub poll: Duration,
}

impl WaitStrategy for PollingWait {
    fn wait(&self, next_run: NaiveDateTime, store: &StateStore) -> WaitOutcome {
        while Local::now().naive_local() < next_run {
            if store.stop_requested() {
                return WaitOutcome::StopRequested;
            }
            if store.force_run_requested() {
                store.clear_if_exists(&store.paths().force_run_file);
                return WaitOutcome::ForceRunRequested;
            }
            thread::sleep(self.poll);
        }
        WaitOutcome::Elapsed
    }
}

pub struct CycleLoop<'a> {
    store: &'a StateStore,
    history: &'a HistoryWriter,
    runner: &'a dyn CycleRunner,
    reconciliation: &'a dyn ReconciliationProcessor,
    wait: &'a dyn WaitStrategy,
    interval: Interval,
    pid: u32,
    capture_output: bool,
}

impl<'a> CycleLoop<'a> {
    pub fn new(
        store: &'a StateStore,
        history: &'a HistoryWriter,
        runner: &'a dyn CycleRunner,
        reconciliation: &'a dyn ReconciliationProcessor,
        wait: &'a dyn WaitStrategy,
        interval: Interval,
    ) -> Self {
        Self {
            store,
            history,
            runner,
            reconciliation,
            wait,
            interval,
            pid: std::process::id(),
            capture_output: true,
        }
    }

    #[cfg(test)]
    fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    #[cfg(test)]
    fn without_capture(mut self) -> Self {
        self.capture_output = false;
        self
    }

    pub fn run(&self, include_faturas_graphql: bool) -> Result<()> {
        self.history.ensure_directories()?;
        self.store.ensure_daemon_dir()?;
        // Markers left behind by a crashed daemon must not trigger now.
        self.store.clear_if_exists(&self.store.paths().stop_file);
        self.store.clear_if_exists(&self.store.paths().force_run_file);

        let mode = faturas_mode_label(include_faturas_graphql);
        self.store.sync_pid_marker(self.pid);
        self.store.save_state(
            DaemonStatus::Running,
            Some(self.pid),
            &format!("Daemon started; waiting for cycles. {mode}"),
            None,
            None,
        )?;
        audit::append_event(
            self.store.paths(),
            "daemon",
            "started",
            &format!("pid={} {mode}", self.pid),
        );

        loop {
            if self.store.stop_requested() {
                self.store.save_state(
                    DaemonStatus::Stopped,
                    Some(self.pid),
                    "Stop signal observed before cycle start.",
                    None,
                    None,
                )?;
                break;
            }

            let start = Local::now().naive_local();
            let cycle_log = self.history.create_cycle_log(start)?;
            let cycle_log_display = std::path::absolute(&cycle_log)
                .unwrap_or_else(|_| cycle_log.clone())
                .display()
                .to_string();
            self.store.save_state(
                DaemonStatus::Running,
                Some(self.pid),
                &format!("Running extraction cycle. {mode} | log_ciclo={cycle_log_display}"),
                Some(&start.format(TIME_FORMAT).to_string()),
                None,
            )?;

            let (cycle_ok, base_detail) =
                match self.run_cycle_captured(&cycle_log, include_faturas_graphql) {
                    Ok(()) => (true, "Ciclo concluido com sucesso.".to_string()),
                    Err(err) => {
                        let chain = format!("{err:#}");
                        if chain.contains(INTEGRITY_ALERT_MARKER) {
                            eprintln!(
                                "ALERTA LOOP: Falha de integridade detectada. O loop continuara no proximo ciclo."
                            );
                            (
                                true,
                                format!(
                                    "Ciclo concluido com alerta de integridade: {}",
                                    history::summarize_message(&chain)
                                ),
                            )
                        } else {
                            (
                                false,
                                format!("Falha no ciclo: {}", history::summarize_message(&chain)),
                            )
                        }
                    }
                };

            let extraction_end = Local::now().naive_local();
            let reconciliation =
                self.process_reconciliation(start, extraction_end, cycle_ok, include_faturas_graphql);
            self.history.append_reconciliation_history(
                start,
                extraction_end,
                cycle_ok,
                reconciliation.as_ref(),
                &cycle_log,
            );

            let end = Local::now().naive_local();
            let cycle_detail = merge_reconciliation_detail(&base_detail, reconciliation.as_ref());
            let summary =
                self.history
                    .build_cycle_summary(start, end, &cycle_log, cycle_ok, &cycle_detail);
            self.history.append_final_summary(&cycle_log, &summary);
            self.history.append_cycle_history(&summary);
            audit::append_event(
                self.store.paths(),
                "cycle",
                summary.status.as_str(),
                &format!(
                    "log={} duration_s={} warns={} errors={}",
                    summary.log_path, summary.duration_secs, summary.warns, summary.errors
                ),
            );

            let next_run = end + self.interval;
            let end_label = end.format(TIME_FORMAT).to_string();
            self.store.save_state(
                waiting_status(cycle_ok, reconciliation.as_ref()),
                Some(self.pid),
                &format!("{} {mode} | log_ciclo={cycle_log_display}", summary.detail),
                Some(&end_label),
                Some(&next_run.format(TIME_FORMAT).to_string()),
            )?;

            match self.wait.wait(next_run, self.store) {
                WaitOutcome::StopRequested => {
                    self.store.save_state(
                        DaemonStatus::Stopped,
                        Some(self.pid),
                        "Stop signal observed while waiting for the next cycle.",
                        Some(&end_label),
                        None,
                    )?;
                    break;
                }
                WaitOutcome::ForceRunRequested => {
                    self.store.save_state(
                        DaemonStatus::Running,
                        Some(self.pid),
                        &format!("Manual trigger observed: starting an immediate cycle. {mode}"),
                        Some(&end_label),
                        None,
                    )?;
                }
                WaitOutcome::Elapsed => {}
            }
        }

        self.store.clear_control_markers();
        audit::append_event(
            self.store.paths(),
            "daemon",
            "stopped",
            &format!("pid={}", self.pid),
        );
        Ok(())
    }

    fn run_cycle_captured(&self, cycle_log: &Path, include_faturas_graphql: bool) -> Result<()> {
        if self.capture_output {
            let _capture = CycleCapture::redirect_to(cycle_log)?;
            self.runner.run_cycle(include_faturas_graphql)
        } else {
            self.runner.run_cycle(include_faturas_graphql)
        }
    }

    fn process_reconciliation(
        &self,
        start: NaiveDateTime,
        extraction_end: NaiveDateTime,
        cycle_ok: bool,
        include_faturas_graphql: bool,
    ) -> Option<ReconciliationSummary> {
        match self
            .reconciliation
            .process(start, extraction_end, cycle_ok, include_faturas_graphql)
        {
            Ok(summary) => Some(summary),
            Err(err) => {
                eprintln!(
                    "ALERTA LOOP: Falha ao processar reconciliacao automatica: {}",
                    history::summarize_message(&format!("{err:#}"))
                );
                None
            }
        }
    }
}

fn waiting_status(cycle_ok: bool, summary: Option<&ReconciliationSummary>) -> DaemonStatus {
    let reconciliation_failed = summary
        .map(|s| s.active && s.failures > 0)
        .unwrap_or(false);
    if cycle_ok && !reconciliation_failed {
        DaemonStatus::WaitingNextCycle
    } else {
        DaemonStatus::WaitingNextCycleWithError
    }
}

pub fn faturas_mode_label(include_faturas_graphql: bool) -> String {
    if include_faturas_graphql {
        "Faturas GraphQL: INCLUIDO".to_string()
    } else {
        "Faturas GraphQL: DESABILITADO (--sem-faturas-graphql)".to_string()
    }
}

fn merge_reconciliation_detail(
    base_detail: &str,
    summary: Option<&ReconciliationSummary>,
) -> String {
    match summary {
        None => format!("{base_detail} | reconciliacao[erro_processamento=true]"),
        Some(s) if !s.active => base_detail.to_string(),
        Some(s) => {
            let mut detail = format!(
                "{base_detail} | reconciliacao[executadas={}, falhas={}, pendentes={}, \
                 diaria_agendada={}, por_falha={}",
                s.executed,
                s.failures,
                s.pending_dates.len(),
                s.daily_scheduled,
                s.pending_on_failure
            );
            if !s.failure_details.is_empty() {
                detail.push_str(&format!(
                    ", detalhe_erro={}",
                    history::summarize_message(&s.failure_details.join(" | "))
                ));
            }
            detail.push(']');
            detail
        }
    }
}
