//! Seams for the external collaborators of the loop daemon.
//!
//! The extraction pipeline, the reconciliation service and the record
//! counter live outside this subsystem. The daemon only knows the trait
//! surface; production wiring invokes the commands configured in
//! `extrator.toml`.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{Command, Stdio};

use crate::daemon::util::{
    TIME_FORMAT, run_command_with_optional_timeout, split_command, tail_chars,
};
use crate::daemon::warn::{self, WarnEvent};

/// Marker carried by the failure chain of a cycle that ended with an
/// operational integrity alert. Cycles failing with this marker are
/// recorded as ALERT and never stop the loop: the condition is expected
/// to heal on a later cycle.
pub const INTEGRITY_ALERT_MARKER: &str = "Fluxo completo interrompido por falha de integridade";

const RECONCILIATION_TIMEOUT_SECS: u64 = 600;
const RECORD_COUNT_TIMEOUT_SECS: u64 = 120;
const ERROR_TAIL_CHARS: usize = 4000;

/// Outcome reported by the reconciliation collaborator, deserialized from
/// the JSON it prints on stdout. Field names follow the reconciliation
/// service's wire vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReconciliationSummary {
    #[serde(rename = "ativo")]
    pub active: bool,
    #[serde(rename = "reconciliacoes_executadas")]
    pub executed: u32,
    #[serde(rename = "falhas")]
    pub failures: u32,
    #[serde(rename = "pendencias_restantes")]
    pub pending_dates: Vec<String>,
    #[serde(rename = "detalhes_falha")]
    pub failure_details: Vec<String>,
    #[serde(rename = "agendou_reconciliacao_diaria")]
    pub daily_scheduled: bool,
    #[serde(rename = "pendencia_por_falha")]
    pub pending_on_failure: bool,
}

impl ReconciliationSummary {
    pub fn inactive() -> Self {
        Self::default()
    }
}

pub trait CycleRunner {
    /// Run one full extraction cycle. Completes or fails; a failure whose
    /// chain contains [`INTEGRITY_ALERT_MARKER`] is absorbed as an alert.
    fn run_cycle(&self, include_faturas_graphql: bool) -> Result<()>;
}

pub trait ReconciliationProcessor {
    fn process(
        &self,
        cycle_start: NaiveDateTime,
        extraction_end: NaiveDateTime,
        cycle_ok: bool,
        include_faturas_graphql: bool,
    ) -> Result<ReconciliationSummary>;
}

pub trait RecordCounter {
    /// Count of records processed in the window; informational only.
    fn count_records(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<i64>;
}

/// Runs the configured extraction command with stdout inherited (the loop
/// has fds 1/2 pointed at the cycle log while a cycle runs) and stderr
/// teed so the failure chain carries the command's own diagnostics — that
/// is what lets the integrity-alert marker classify correctly.
pub struct CommandCycleRunner {
    command: Option<String>,
}

impl CommandCycleRunner {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl CycleRunner for CommandCycleRunner {
    fn run_cycle(&self, include_faturas_graphql: bool) -> Result<()> {
        let Some(raw) = self.command.as_deref() else {
            warn::emit(WarnEvent {
                code: "CYCLE_COMMAND_MISSING",
                stage: "cycle",
                action: "run-cycle",
                path: "na",
                err: "no [commands].cycle configured; cycle is a no-op",
            });
            println!("No extraction command configured; cycle is a no-op.");
            return Ok(());
        };

        let (program, mut args) =
            split_command(raw).ok_or_else(|| anyhow!("invalid cycle command: {raw:?}"))?;
        if !include_faturas_graphql {
            args.push("--sem-faturas-graphql".to_string());
        }

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch cycle command {program}"))?;

        let mut stderr_text = String::new();
        if let Some(mut stderr) = child.stderr.take() {
            let _ = stderr.read_to_string(&mut stderr_text);
        }
        let status = child
            .wait()
            .with_context(|| format!("failed to wait for cycle command {program}"))?;

        // Replay the command's stderr into our own (captured) stream so it
        // is part of the cycle log like everything else.
        if !stderr_text.is_empty() {
            eprint!("{stderr_text}");
        }

        if !status.success() {
            anyhow::bail!(
                "cycle command exited with {status}: {}",
                tail_chars(stderr_text.trim(), ERROR_TAIL_CHARS)
            );
        }
        Ok(())
    }
}

/// Invokes the configured reconciliation command with the cycle window
/// and outcome, expecting a [`ReconciliationSummary`] as JSON on stdout.
pub struct CommandReconciliation {
    command: Option<String>,
}

impl CommandReconciliation {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl ReconciliationProcessor for CommandReconciliation {
    fn process(
        &self,
        cycle_start: NaiveDateTime,
        extraction_end: NaiveDateTime,
        cycle_ok: bool,
        include_faturas_graphql: bool,
    ) -> Result<ReconciliationSummary> {
        let Some(raw) = self.command.as_deref() else {
            return Ok(ReconciliationSummary::inactive());
        };

        let (program, mut args) =
            split_command(raw).ok_or_else(|| anyhow!("invalid reconciliation command: {raw:?}"))?;
        args.push("--inicio".to_string());
        args.push(cycle_start.format(TIME_FORMAT).to_string());
        args.push("--fim".to_string());
        args.push(extraction_end.format(TIME_FORMAT).to_string());
        args.push("--ciclo-sucesso".to_string());
        args.push(cycle_ok.to_string());
        if !include_faturas_graphql {
            args.push("--sem-faturas-graphql".to_string());
        }

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        let output = run_command_with_optional_timeout(&mut cmd, Some(RECONCILIATION_TIMEOUT_SECS))
            .with_context(|| format!("failed to run reconciliation command {program}"))?;
        if !output.status.success() {
            let stderr_text = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "reconciliation command exited with {}: {}",
                output.status,
                tail_chars(stderr_text.trim(), ERROR_TAIL_CHARS)
            );
        }

        serde_json::from_slice(&output.stdout)
            .context("failed to parse reconciliation summary JSON")
    }
}

/// Asks the configured command for the record total of a window; reports
/// zero when unconfigured.
pub struct CommandRecordCounter {
    command: Option<String>,
}

impl CommandRecordCounter {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl RecordCounter for CommandRecordCounter {
    fn count_records(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<i64> {
        let Some(raw) = self.command.as_deref() else {
            return Ok(0);
        };

        let (program, mut args) =
            split_command(raw).ok_or_else(|| anyhow!("invalid record count command: {raw:?}"))?;
        args.push("--inicio".to_string());
        args.push(start.format(TIME_FORMAT).to_string());
        args.push("--fim".to_string());
        args.push(end.format(TIME_FORMAT).to_string());

        let mut cmd = Command::new(&program);
        cmd.args(&args);
        let output = run_command_with_optional_timeout(&mut cmd, Some(RECORD_COUNT_TIMEOUT_SECS))
            .with_context(|| format!("failed to run record count command {program}"))?;
        if !output.status.success() {
            anyhow::bail!("record count command exited with {}", output.status);
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim()
            .parse::<i64>()
            .with_context(|| format!("record count command printed a non-integer: {:?}", text.trim()))
    }
}
