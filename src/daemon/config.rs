use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopTimings {
    /// Minutes between the end of one cycle and the start of the next.
    pub interval_minutes: u64,
    /// Granularity of the stop/force-run marker polling while waiting.
    pub poll_secs: u64,
    /// How long `start` waits before confirming the spawned daemon lives.
    pub start_grace_ms: u64,
    /// How long `stop` lets the loop honor the stop marker before SIGTERM.
    pub stop_grace_secs: u64,
    /// How long `stop` waits after SIGTERM before escalating to SIGKILL.
    pub kill_wait_secs: u64,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            poll_secs: 1,
            start_grace_ms: 1200,
            stop_grace_secs: 20,
            kill_wait_secs: 2,
        }
    }
}

/// External collaborator commands. All optional: an unconfigured cycle
/// command makes the daemon an idle scheduler, an unconfigured
/// reconciliation command reports the inactive summary, an unconfigured
/// record counter reports zero.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CollaboratorCommands {
    pub cycle: Option<String>,
    pub reconciliation: Option<String>,
    pub record_count: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoopConfig {
    #[serde(rename = "loop", default)]
    pub timings: LoopTimings,
    #[serde(default)]
    pub commands: CollaboratorCommands,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialLoopConfig {
    #[serde(rename = "loop")]
    timings: Option<LoopTimings>,
    commands: Option<CollaboratorCommands>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn resolve_config_path() -> PathBuf {
    if let Ok(custom) = env::var("EXTRATOR_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    PathBuf::from("extrator.toml")
}

fn merge_file_config(base: &mut LoopConfig) -> Result<()> {
    let path = resolve_config_path();
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialLoopConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", path.display()))?;
    if let Some(timings) = parsed.timings {
        base.timings = timings;
    }
    if let Some(commands) = parsed.commands {
        base.commands = commands;
    }
    Ok(())
}

fn validate(cfg: &LoopConfig) -> Result<()> {
    if cfg.timings.interval_minutes == 0 {
        return Err(anyhow!("invalid loop interval: must be >= 1 minute"));
    }
    if cfg.timings.poll_secs == 0 {
        return Err(anyhow!("invalid marker poll interval: must be >= 1 second"));
    }
    if cfg.timings.stop_grace_secs == 0 {
        return Err(anyhow!("invalid stop grace period: must be >= 1 second"));
    }
    Ok(())
}

pub fn load_config() -> Result<LoopConfig> {
    let mut cfg = LoopConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.timings.interval_minutes =
        env_or_u64("EXTRATOR_INTERVAL_MINUTES", cfg.timings.interval_minutes);
    cfg.timings.poll_secs = env_or_u64("EXTRATOR_POLL_SECS", cfg.timings.poll_secs);
    cfg.timings.start_grace_ms = env_or_u64("EXTRATOR_START_GRACE_MS", cfg.timings.start_grace_ms);
    cfg.timings.stop_grace_secs =
        env_or_u64("EXTRATOR_STOP_GRACE_SECS", cfg.timings.stop_grace_secs);
    cfg.timings.kill_wait_secs = env_or_u64("EXTRATOR_KILL_WAIT_SECS", cfg.timings.kill_wait_secs);
    cfg.commands.cycle = env_or_opt_string("EXTRATOR_CYCLE_COMMAND", cfg.commands.cycle.take());
    cfg.commands.reconciliation = env_or_opt_string(
        "EXTRATOR_RECONCILIATION_COMMAND",
        cfg.commands.reconciliation.take(),
    );
    cfg.commands.record_count = env_or_opt_string(
        "EXTRATOR_RECORD_COUNT_COMMAND",
        cfg.commands.record_count.take(),
    );

    validate(&cfg)?;
    Ok(cfg)
}
