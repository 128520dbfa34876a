//! Cycle history: per-cycle logs, outcome classification and the two
//! monthly ledgers.
//!
//! The log markers, ledger headers and status labels are the vocabulary
//! the monitoring dashboard consumes; they must not be reworded.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::daemon::collab::{RecordCounter, ReconciliationSummary};
use crate::daemon::paths::DaemonPaths;
use crate::daemon::util::TIME_FORMAT;
use crate::daemon::warn::{self, WarnEvent};

const CYCLE_LOG_PREFIX: &str = "extracao_daemon_";
const CYCLE_LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const HISTORY_MONTH_FORMAT: &str = "%Y_%m";
const MAX_DETAIL_CHARS: usize = 240;

const DAEMON_HISTORY_HEADER: &str =
    "DATA_HORA_FIM;INICIO;FIM;DURACAO_S;STATUS;TOTAL_RECORDS;WARNS;ERRORS;DETALHE;LOG_CICLO";
const RECONCILIACAO_HISTORY_HEADER: &str = "DATA_HORA;INICIO_CICLO;FIM_EXTRACAO;CICLO_SUCESSO;\
STATUS_RECONCILIACAO;ATIVA;EXECUTADAS;FALHAS;PENDENTES;AGENDOU_DIARIA;PENDENCIA_POR_FALHA;\
DETALHE;LOG_CICLO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Success,
    Alert,
    Error,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Success => "SUCCESS",
            CycleStatus::Alert => "ALERT",
            CycleStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_secs: i64,
    pub status: CycleStatus,
    pub total_records: i64,
    pub warns: u32,
    pub errors: u32,
    pub detail: String,
    pub log_path: String,
}

pub struct HistoryWriter {
    paths: DaemonPaths,
    counter: Box<dyn RecordCounter>,
}

impl HistoryWriter {
    pub fn new(paths: DaemonPaths, counter: Box<dyn RecordCounter>) -> Self {
        Self { paths, counter }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        ensure_directories(&self.paths)
    }

    /// One log file per cycle, named by start timestamp, under the
    /// cycle's own per-day folder.
    pub fn create_cycle_log(&self, start: NaiveDateTime) -> Result<PathBuf> {
        self.ensure_directories()?;
        let day_dir = self.paths.cycles_dir.join(start.date().to_string());
        fs::create_dir_all(&day_dir)
            .with_context(|| format!("failed to create {}", day_dir.display()))?;
        let file = day_dir.join(format!(
            "{CYCLE_LOG_PREFIX}{}.log",
            start.format(CYCLE_LOG_TIMESTAMP_FORMAT)
        ));
        if !file.exists() {
            fs::File::create(&file)
                .with_context(|| format!("failed to create {}", file.display()))?;
        }
        Ok(file)
    }

    /// Scan the captured cycle log for outcome markers and fold in the
    /// informational record total. Read failures leave the counts at
    /// their defaults; the summary is always produced.
    pub fn build_cycle_summary(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        cycle_log: &Path,
        cycle_ok: bool,
        base_detail: &str,
    ) -> CycleSummary {
        let mut warns = 0u32;
        let mut errors = 0u32;
        let mut integrity_alert = false;
        let mut incomplete = false;
        let mut final_ok = false;

        if let Ok(text) = fs::read_to_string(cycle_log) {
            for line in text.lines() {
                if line.contains(" WARN ") {
                    warns += 1;
                }
                if line.contains(" ERROR ") {
                    errors += 1;
                }
                if line.contains("ALERTA_LOOP")
                    || line.contains("EXTRACAO CONCLUIDA COM ALERTA DE INTEGRIDADE")
                    || line.contains("RESUMO DA EXTRACAO (com alerta de integridade no loop)")
                {
                    integrity_alert = true;
                }
                if line.contains("status_code=INCOMPLETO") {
                    incomplete = true;
                }
                if line.contains("Todas as APIs foram processadas com sucesso.") {
                    final_ok = true;
                }
            }
        }

        let duration_secs = (end - start).num_seconds().max(0);
        let total_records = self.counter.count_records(start, end).unwrap_or(0);
        let status = determine_cycle_status(cycle_ok, integrity_alert, incomplete, errors);
        let detail =
            build_detail_summary(base_detail, integrity_alert, incomplete, final_ok, warns, errors);

        CycleSummary {
            start,
            end,
            duration_secs,
            status,
            total_records,
            warns,
            errors,
            detail,
            log_path: display_path(cycle_log),
        }
    }

    /// Human-readable trailing block appended to the cycle's own log.
    pub fn append_final_summary(&self, cycle_log: &Path, summary: &CycleSummary) {
        let block = format!(
            "\n============================================================\n\
             RESUMO FINAL DO CICLO (DAEMON)\n\
             ============================================================\n\
             Inicio: {}\n\
             Fim: {}\n\
             Duracao (segundos): {}\n\
             Status do ciclo: {}\n\
             Total de registros (log_extracoes): {}\n\
             Warnings: {} | Errors: {}\n\
             Detalhe: {}\n\
             Log do ciclo: {}\n\
             ============================================================\n",
            summary.start.format(TIME_FORMAT),
            summary.end.format(TIME_FORMAT),
            summary.duration_secs,
            summary.status.as_str(),
            summary.total_records,
            summary.warns,
            summary.errors,
            summary.detail,
            summary.log_path,
        );
        if let Err(err) = append_to_file(cycle_log, &block) {
            warn::emit(WarnEvent {
                code: "CYCLE_SUMMARY_APPEND_FAILED",
                stage: "history",
                action: "append-final-summary",
                path: &cycle_log.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }

    /// One row per cycle in the monthly cycle ledger.
    pub fn append_cycle_history(&self, summary: &CycleSummary) {
        let file = self.paths.history_dir.join(format!(
            "execucao_daemon_{}.csv",
            summary.end.format(HISTORY_MONTH_FORMAT)
        ));
        let row = [
            summary.end.format(TIME_FORMAT).to_string(),
            summary.start.format(TIME_FORMAT).to_string(),
            summary.end.format(TIME_FORMAT).to_string(),
            summary.duration_secs.to_string(),
            sanitize_csv(summary.status.as_str()),
            summary.total_records.to_string(),
            summary.warns.to_string(),
            summary.errors.to_string(),
            sanitize_csv(&summary.detail),
            sanitize_csv(&summary.log_path),
        ]
        .join(";");

        if let Err(err) = append_ledger_row(&file, DAEMON_HISTORY_HEADER, &row) {
            warn::emit(WarnEvent {
                code: "CYCLE_LEDGER_APPEND_FAILED",
                stage: "history",
                action: "append-cycle-history",
                path: &file.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }

    /// One row per cycle in the monthly reconciliation ledger, written
    /// even when the reconciliation outcome is absent.
    pub fn append_reconciliation_history(
        &self,
        cycle_start: NaiveDateTime,
        extraction_end: NaiveDateTime,
        cycle_ok: bool,
        summary: Option<&ReconciliationSummary>,
        cycle_log: &Path,
    ) {
        let file = self.paths.reconciliation_dir.join(format!(
            "reconciliacao_daemon_{}.csv",
            extraction_end.format(HISTORY_MONTH_FORMAT)
        ));

        let active = summary.map(|s| s.active).unwrap_or(false);
        let executed = summary.map(|s| s.executed).unwrap_or(0);
        let failures = summary.map(|s| s.failures).unwrap_or(0);
        let pending = summary
            .map(|s| s.pending_dates.len() as i64)
            .unwrap_or(-1);
        let daily_scheduled = summary.map(|s| s.daily_scheduled).unwrap_or(false);
        let pending_on_failure = summary.map(|s| s.pending_on_failure).unwrap_or(false);

        let row = [
            extraction_end.format(TIME_FORMAT).to_string(),
            cycle_start.format(TIME_FORMAT).to_string(),
            extraction_end.format(TIME_FORMAT).to_string(),
            cycle_ok.to_string(),
            sanitize_csv(reconciliation_status(summary)),
            active.to_string(),
            executed.to_string(),
            failures.to_string(),
            pending.to_string(),
            daily_scheduled.to_string(),
            pending_on_failure.to_string(),
            sanitize_csv(&reconciliation_detail(summary)),
            sanitize_csv(&display_path(cycle_log)),
        ]
        .join(";");

        if let Err(err) = append_ledger_row(&file, RECONCILIACAO_HISTORY_HEADER, &row) {
            warn::emit(WarnEvent {
                code: "RECONCILIATION_LEDGER_APPEND_FAILED",
                stage: "history",
                action: "append-reconciliation-history",
                path: &file.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }
}

/// Create the daemon directory tree and sweep legacy flat cycle logs into
/// their per-day folders.
pub fn ensure_directories(paths: &DaemonPaths) -> Result<()> {
    for dir in [
        &paths.daemon_dir,
        &paths.cycles_dir,
        &paths.history_dir,
        &paths.reconciliation_dir,
        &paths.runtime_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    relocate_legacy_cycle_logs(&paths.cycles_dir);
    Ok(())
}

fn relocate_legacy_cycle_logs(cycles_dir: &Path) {
    let Ok(entries) = fs::read_dir(cycles_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(date) = legacy_cycle_log_date(&name) else {
            continue;
        };
        let day_dir = cycles_dir.join(&date);
        let dest = day_dir.join(&name);
        let moved = fs::create_dir_all(&day_dir).and_then(|()| fs::rename(&path, &dest));
        if let Err(err) = moved {
            warn::emit(WarnEvent {
                code: "LEGACY_LOG_MOVE_FAILED",
                stage: "history",
                action: "relocate-legacy-log",
                path: &path.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }
}

/// Extract the date folder from a legacy flat cycle log name, e.g.
/// `extracao_daemon_2026-08-08_10-30-00.log` -> `2026-08-08`.
pub fn legacy_cycle_log_date(name: &str) -> Option<String> {
    let rest = name.strip_prefix(CYCLE_LOG_PREFIX)?;
    let rest = rest.strip_suffix(".log")?;
    if rest.len() != 19 {
        return None;
    }
    let (date_part, remainder) = rest.split_at(10);
    let time_part = remainder.strip_prefix('_')?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    NaiveTime::parse_from_str(time_part, "%H-%M-%S").ok()?;
    Some(date_part.to_string())
}

pub fn determine_cycle_status(
    cycle_ok: bool,
    integrity_alert: bool,
    incomplete: bool,
    errors: u32,
) -> CycleStatus {
    if !cycle_ok {
        return CycleStatus::Error;
    }
    if integrity_alert || incomplete || errors > 0 {
        return CycleStatus::Alert;
    }
    CycleStatus::Success
}

fn build_detail_summary(
    base_detail: &str,
    integrity_alert: bool,
    incomplete: bool,
    final_ok: bool,
    warns: u32,
    errors: u32,
) -> String {
    let mut detail = String::new();
    detail.push_str(if base_detail.is_empty() {
        "Sem detalhes."
    } else {
        base_detail
    });
    detail.push_str(&format!(" | warns={warns}"));
    detail.push_str(&format!(" | errors={errors}"));
    if integrity_alert {
        detail.push_str(" | alerta_integridade=true");
    }
    if incomplete {
        detail.push_str(" | status_incompleto=true");
    }
    detail.push_str(&format!(" | resumo_final_ok={final_ok}"));
    summarize_message(&detail)
}

/// Reconciliation status label for the ledger.
pub fn reconciliation_status(summary: Option<&ReconciliationSummary>) -> &'static str {
    let Some(summary) = summary else {
        return "ERRO_PROCESSAMENTO";
    };
    if !summary.active {
        return "INATIVA";
    }
    if summary.failures > 0 {
        return "COM_FALHAS";
    }
    if summary.executed > 0 || summary.daily_scheduled || summary.pending_on_failure {
        return "EXECUTADA";
    }
    "SEM_ACAO"
}

pub fn reconciliation_detail(summary: Option<&ReconciliationSummary>) -> String {
    let Some(summary) = summary else {
        return "Falha ao processar reconciliacao automatica.".to_string();
    };
    if !summary.active {
        return "Reconciliacao desativada por configuracao.".to_string();
    }

    let mut detail = String::from("pendencias_restantes=");
    if summary.pending_dates.is_empty() {
        detail.push_str("nenhuma");
    } else {
        detail.push_str(&summary.pending_dates.join(","));
    }
    if !summary.failure_details.is_empty() {
        detail.push_str(" | falhas=");
        detail.push_str(&summary.failure_details.join(" | "));
    }
    detail
}

/// Collapse a message to a single bounded line for state details and
/// ledger fields.
pub fn summarize_message(msg: &str) -> String {
    if msg.trim().is_empty() {
        return "Sem detalhes.".to_string();
    }
    let clean = msg.replace(['\n', '\r'], " ").trim().to_string();
    if clean.chars().count() > MAX_DETAIL_CHARS {
        let truncated: String = clean.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{truncated}...")
    } else {
        clean
    }
}

/// Ledger fields must stay single-line and free of the row delimiter.
pub fn sanitize_csv(value: &str) -> String {
    value
        .replace('\r', " ")
        .replace('\n', " ")
        .replace(';', ",")
        .trim()
        .to_string()
}

fn display_path(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn append_ledger_row(file: &Path, header: &str, row: &str) -> Result<()> {
    let needs_header = match fs::metadata(file) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };

    let mut out = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| format!("failed to open ledger {}", file.display()))?;
    if needs_header {
        writeln!(out, "{header}")?;
    }
    writeln!(out, "{row}")?;
    Ok(())
}

fn append_to_file(file: &Path, content: &str) -> Result<()> {
    let mut out = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| format!("failed to open {}", file.display()))?;
    out.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::collab::RecordCounter;
    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    struct FixedCounter(i64);

    impl RecordCounter for FixedCounter {
        fn count_records(&self, _start: NaiveDateTime, _end: NaiveDateTime) -> Result<i64> {
            Ok(self.0)
        }
    }

    struct FailingCounter;

    impl RecordCounter for FailingCounter {
        fn count_records(&self, _start: NaiveDateTime, _end: NaiveDateTime) -> Result<i64> {
            anyhow::bail!("repository unavailable")
        }
    }

    fn writer(dir: &Path, counter: Box<dyn RecordCounter>) -> HistoryWriter {
        HistoryWriter::new(DaemonPaths::new(dir.join("daemon"), None), counter)
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 8)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn cycle_log_lives_under_its_day_folder() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(0)));
        let log = writer.create_cycle_log(at(10, 30, 0)).expect("create");
        assert!(log.ends_with("2026-08-08/extracao_daemon_2026-08-08_10-30-00.log"));
        assert!(log.exists());
    }

    #[test]
    fn classification_counts_tagged_lines_and_detects_markers() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(321)));
        let log = writer.create_cycle_log(at(10, 0, 0)).expect("create");
        fs::write(
            &log,
            "10:00:01 INFO inicio\n\
             10:00:02 WARN janela lenta\n\
             10:00:03 ERROR item rejeitado\n\
             10:00:04 INFO status_code=INCOMPLETO\n\
             10:00:05 INFO Todas as APIs foram processadas com sucesso.\n",
        )
        .expect("write log");

        let summary = writer.build_cycle_summary(at(10, 0, 0), at(10, 5, 0), &log, true, "base");
        assert_eq!(summary.status, CycleStatus::Alert);
        assert_eq!(summary.warns, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.total_records, 321);
        assert_eq!(summary.duration_secs, 300);
        assert!(summary.detail.contains("status_incompleto=true"));
        assert!(summary.detail.contains("resumo_final_ok=true"));
    }

    #[test]
    fn clean_log_classifies_success() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(5)));
        let log = writer.create_cycle_log(at(11, 0, 0)).expect("create");
        fs::write(&log, "11:00:01 INFO tudo certo\n").expect("write log");

        let summary = writer.build_cycle_summary(at(11, 0, 0), at(11, 1, 0), &log, true, "ok");
        assert_eq!(summary.status, CycleStatus::Success);
    }

    #[test]
    fn failed_execution_wins_over_any_marker() {
        assert_eq!(
            determine_cycle_status(false, true, true, 9),
            CycleStatus::Error
        );
        assert_eq!(determine_cycle_status(true, true, false, 0), CycleStatus::Alert);
        assert_eq!(determine_cycle_status(true, false, false, 0), CycleStatus::Success);
    }

    #[test]
    fn record_counter_failure_degrades_to_zero() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FailingCounter));
        let log = writer.create_cycle_log(at(12, 0, 0)).expect("create");
        let summary = writer.build_cycle_summary(at(12, 0, 0), at(12, 1, 0), &log, true, "ok");
        assert_eq!(summary.total_records, 0);
    }

    #[test]
    fn monthly_ledger_gets_exactly_one_header() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(0)));
        writer.ensure_directories().expect("dirs");
        let log = writer.create_cycle_log(at(9, 0, 0)).expect("create");

        for minute in 0..3 {
            let summary = writer.build_cycle_summary(
                at(9, minute, 0),
                at(9, minute, 30),
                &log,
                true,
                "Ciclo concluido com sucesso.",
            );
            writer.append_cycle_history(&summary);
        }

        let ledger = writer
            .paths
            .history_dir
            .join("execucao_daemon_2026_08.csv");
        let raw = fs::read_to_string(&ledger).expect("ledger");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], DAEMON_HISTORY_HEADER);
        for line in &lines[1..] {
            assert!(line.contains(";SUCCESS;"));
        }
    }

    #[test]
    fn reconciliation_ledger_row_with_absent_summary() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(0)));
        writer.ensure_directories().expect("dirs");
        let log = writer.create_cycle_log(at(9, 0, 0)).expect("create");

        writer.append_reconciliation_history(at(9, 0, 0), at(9, 5, 0), true, None, &log);

        let ledger = writer
            .paths
            .reconciliation_dir
            .join("reconciliacao_daemon_2026_08.csv");
        let raw = fs::read_to_string(&ledger).expect("ledger");
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], RECONCILIACAO_HISTORY_HEADER);
        assert!(lines[1].contains(";ERRO_PROCESSAMENTO;"));
        assert!(lines[1].contains(";-1;"));
        assert!(lines[1].contains("Falha ao processar reconciliacao automatica."));
    }

    #[test]
    fn reconciliation_status_labels() {
        let mut summary = ReconciliationSummary::inactive();
        assert_eq!(reconciliation_status(None), "ERRO_PROCESSAMENTO");
        assert_eq!(reconciliation_status(Some(&summary)), "INATIVA");

        summary.active = true;
        assert_eq!(reconciliation_status(Some(&summary)), "SEM_ACAO");

        summary.daily_scheduled = true;
        assert_eq!(reconciliation_status(Some(&summary)), "EXECUTADA");

        summary.failures = 2;
        assert_eq!(reconciliation_status(Some(&summary)), "COM_FALHAS");
    }

    #[test]
    fn reconciliation_detail_lists_pending_dates() {
        let mut summary = ReconciliationSummary::inactive();
        summary.active = true;
        summary.pending_dates = vec!["2026-08-06".to_string(), "2026-08-07".to_string()];
        summary.failure_details = vec!["janela falhou".to_string()];

        let detail = reconciliation_detail(Some(&summary));
        assert_eq!(
            detail,
            "pendencias_restantes=2026-08-06,2026-08-07 | falhas=janela falhou"
        );
        assert_eq!(
            reconciliation_detail(Some(&ReconciliationSummary::inactive())),
            "Reconciliacao desativada por configuracao."
        );
    }

    #[test]
    fn trailing_summary_block_is_appended_to_the_cycle_log() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(7)));
        let log = writer.create_cycle_log(at(14, 0, 0)).expect("create");
        fs::write(&log, "14:00:01 INFO rodando\n").expect("write log");

        let summary = writer.build_cycle_summary(at(14, 0, 0), at(14, 2, 0), &log, true, "ok");
        writer.append_final_summary(&log, &summary);

        let content = fs::read_to_string(&log).expect("read log");
        assert!(content.contains("RESUMO FINAL DO CICLO (DAEMON)"));
        assert!(content.contains("Status do ciclo: SUCCESS"));
        assert!(content.contains("Total de registros (log_extracoes): 7"));
    }

    #[test]
    fn summarize_message_bounds_and_flattens() {
        assert_eq!(summarize_message("  "), "Sem detalhes.");
        assert_eq!(summarize_message("a\nb\rc"), "a b c");
        let long = "x".repeat(500);
        let out = summarize_message(&long);
        assert_eq!(out.chars().count(), 243);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn sanitize_csv_strips_delimiters_and_newlines() {
        assert_eq!(sanitize_csv("a;b\nc\r"), "a,b c");
    }

    #[test]
    fn legacy_cycle_log_names_parse_strictly() {
        assert_eq!(
            legacy_cycle_log_date("extracao_daemon_2026-08-08_10-30-00.log"),
            Some("2026-08-08".to_string())
        );
        assert_eq!(legacy_cycle_log_date("extracao_daemon_notadate.log"), None);
        assert_eq!(legacy_cycle_log_date("outro_arquivo.log"), None);
        assert_eq!(
            legacy_cycle_log_date("extracao_daemon_2026-13-40_99-99-99.log"),
            None
        );
    }

    #[test]
    fn legacy_logs_move_into_their_day_folder() {
        let tmp = tempdir().expect("tempdir");
        let writer = writer(tmp.path(), Box::new(FixedCounter(0)));
        fs::create_dir_all(&writer.paths.cycles_dir).expect("dirs");

        let legacy = writer
            .paths
            .cycles_dir
            .join("extracao_daemon_2026-08-01_08-00-00.log");
        fs::write(&legacy, "legado").expect("write");
        let unrelated = writer.paths.cycles_dir.join("notas.txt");
        fs::write(&unrelated, "deixa quieto").expect("write");

        writer.ensure_directories().expect("dirs");

        assert!(!legacy.exists());
        assert!(
            writer
                .paths
                .cycles_dir
                .join("2026-08-01/extracao_daemon_2026-08-01_08-00-00.log")
                .exists()
        );
        assert!(unrelated.exists());
    }
}
