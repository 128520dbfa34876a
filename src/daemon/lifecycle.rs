//! OS process lifecycle of the loop daemon: who is running, how a new
//! daemon is spawned, and how discovered processes are torn down.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, Signal, System};

use crate::daemon::paths::{RUN_INTERNAL_MARKER, RUNTIME_BIN_PREFIX};
use crate::daemon::state::StateStore;
use crate::daemon::warn::{self, WarnEvent};

const MAX_RUNTIME_BINARIES: usize = 3;
const TERMINATION_POLL: Duration = Duration::from_millis(300);
const FINAL_WAIT: Duration = Duration::from_secs(1);

pub struct LifecycleService<'a> {
    store: &'a StateStore,
}

impl<'a> LifecycleService<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Resolve the running daemon, in precedence order: the dedicated pid
    /// marker, the pid embedded in the persisted state, then a full scan
    /// of live processes. The markers are fast but can go stale after a
    /// crash; the scan is ground truth but needs the signature filter to
    /// avoid an unrelated process that reused a recorded pid.
    pub fn find_active_daemon(&self) -> Option<u32> {
        if let Some(pid) = self.store.read_pid_marker()
            && self.is_daemon_process(pid)
        {
            return Some(pid);
        }
        if let Some(pid) = self.store.read_pid_from_state()
            && self.is_daemon_process(pid)
        {
            return Some(pid);
        }
        self.scan_daemon_processes().into_iter().next()
    }

    /// Every live signature-matching process, from all three sources.
    /// More than one entry means idempotency was bypassed externally.
    pub fn find_stop_targets(&self) -> Vec<u32> {
        let mut targets = Vec::new();
        for pid in [self.store.read_pid_marker(), self.store.read_pid_from_state()]
            .into_iter()
            .flatten()
        {
            if !targets.contains(&pid) && self.is_daemon_process(pid) {
                targets.push(pid);
            }
        }
        for pid in self.scan_daemon_processes() {
            if !targets.contains(&pid) {
                targets.push(pid);
            }
        }
        targets
    }

    pub fn is_daemon_process(&self, pid: u32) -> bool {
        let mut sys = System::new();
        if !sys.refresh_process_specifics(Pid::from_u32(pid), ProcessRefreshKind::everything()) {
            return false;
        }
        sys.process(Pid::from_u32(pid))
            .map(process_matches)
            .unwrap_or(false)
    }

    fn scan_daemon_processes(&self) -> Vec<u32> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessRefreshKind::everything());
        let mut pids: Vec<u32> = sys
            .processes()
            .values()
            .filter(|process| process_matches(process))
            .map(|process| process.pid().as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }

    /// Spawn the background daemon from a private runtime copy of the
    /// current executable, so the deployed binary can be replaced while a
    /// daemon is alive. Output goes to the console log; the child is
    /// detached into its own process group.
    pub fn spawn_daemon(&self, include_faturas_graphql: bool) -> Result<u32> {
        let paths = self.store.paths();
        let runtime_bin = self.prepare_runtime_binary()?;

        let console = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&paths.console_log)
            .with_context(|| format!("failed to open {}", paths.console_log.display()))?;
        let console_err = console
            .try_clone()
            .context("failed to clone console log handle")?;

        let mut cmd = Command::new(&runtime_bin);
        cmd.arg(RUN_INTERNAL_MARKER);
        if !include_faturas_graphql {
            cmd.arg("--sem-faturas-graphql");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(console))
            .stderr(Stdio::from(console_err));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn daemon from {}", runtime_bin.display()))?;
        Ok(child.id())
    }

    /// Tear down the discovered processes: give the loop the configured
    /// grace period to honor the stop marker, SIGTERM survivors, wait the
    /// shorter bound, SIGKILL what is left, and report anything that
    /// still refuses to die.
    pub fn terminate(&self, pids: &[u32], stop_grace: Duration, kill_wait: Duration) -> Vec<u32> {
        self.wait_for_exit(pids, stop_grace);
        signal_alive(pids, Signal::Term);
        self.wait_for_exit(pids, kill_wait);
        signal_alive(pids, Signal::Kill);
        self.wait_for_exit(pids, FINAL_WAIT);
        alive_pids(pids)
    }

    pub fn wait_for_exit(&self, pids: &[u32], timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            if alive_pids(pids).is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                return;
            }
            thread::sleep(TERMINATION_POLL);
        }
    }

    fn prepare_runtime_binary(&self) -> Result<PathBuf> {
        let paths = self.store.paths();
        fs::create_dir_all(&paths.runtime_dir)
            .with_context(|| format!("failed to create {}", paths.runtime_dir.display()))?;

        let current = std::env::current_exe().context("failed to resolve current executable")?;
        let millis = crate::daemon::util::now_epoch_millis().unwrap_or(0);
        let dest = paths
            .runtime_dir
            .join(format!("{RUNTIME_BIN_PREFIX}-{millis}"));
        fs::copy(&current, &dest).with_context(|| {
            format!(
                "failed to copy {} to {}",
                current.display(),
                dest.display()
            )
        })?;
        prune_runtime_binaries(&paths.runtime_dir, &dest);
        Ok(std::path::absolute(&dest).unwrap_or(dest))
    }
}

fn process_matches(process: &Process) -> bool {
    if matches!(
        process.status(),
        ProcessStatus::Zombie | ProcessStatus::Dead
    ) {
        return false;
    }
    let command_line = process.cmd().join(" ");
    if command_line.is_empty() {
        return false;
    }
    is_daemon_command_line(&command_line)
}

/// Signature predicate for daemon processes: the internal run-internal
/// invocation marker plus an executable shape that belongs to us — a
/// runtime copy or the installed `extrator` binary.
pub fn is_daemon_command_line(command_line: &str) -> bool {
    let normalized = command_line.to_lowercase().replace('\\', "/");
    if !normalized.contains(RUN_INTERNAL_MARKER) {
        return false;
    }
    if normalized.contains(RUNTIME_BIN_PREFIX) {
        return true;
    }
    let first = normalized.split_whitespace().next().unwrap_or("");
    Path::new(first)
        .file_stem()
        .map(|stem| stem == "extrator")
        .unwrap_or(false)
}

fn alive_pids(pids: &[u32]) -> Vec<u32> {
    let mut sys = System::new();
    sys.refresh_processes();
    pids.iter()
        .copied()
        .filter(|pid| {
            sys.process(Pid::from_u32(*pid))
                .map(|process| {
                    !matches!(
                        process.status(),
                        ProcessStatus::Zombie | ProcessStatus::Dead
                    )
                })
                .unwrap_or(false)
        })
        .collect()
}

fn signal_alive(pids: &[u32], signal: Signal) {
    let mut sys = System::new();
    sys.refresh_processes();
    for pid in pids {
        if let Some(process) = sys.process(Pid::from_u32(*pid))
            && process.kill_with(signal).is_none()
        {
            // Platform without that signal: fall back to a plain kill.
            process.kill();
        }
    }
}

fn prune_runtime_binaries(runtime_dir: &Path, current: &Path) {
    let Ok(entries) = fs::read_dir(runtime_dir) else {
        return;
    };
    let mut runtimes: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(RUNTIME_BIN_PREFIX))
                .unwrap_or(false)
        })
        .collect();

    runtimes.sort_by_key(|path| {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });
    runtimes.reverse();

    for stale in runtimes.iter().skip(MAX_RUNTIME_BINARIES) {
        if stale == current {
            continue;
        }
        if let Err(err) = fs::remove_file(stale) {
            warn::emit(WarnEvent {
                code: "RUNTIME_PRUNE_FAILED",
                stage: "lifecycle",
                action: "prune-runtime",
                path: &stale.display().to_string(),
                err: &format!("{err:#}"),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_RUNTIME_BINARIES, is_daemon_command_line, prune_runtime_binaries};
    use crate::daemon::paths::RUNTIME_BIN_PREFIX;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn runtime_copy_command_line_matches() {
        assert!(is_daemon_command_line(
            "/srv/extrator/logs/daemon/runtime/extrator-daemon-runtime-1754650000000 run-internal"
        ));
    }

    #[test]
    fn installed_binary_command_line_matches() {
        assert!(is_daemon_command_line(
            "/usr/local/bin/extrator run-internal --sem-faturas-graphql"
        ));
    }

    #[test]
    fn windows_style_paths_are_normalized() {
        assert!(is_daemon_command_line(
            "C:\\extrator\\logs\\daemon\\runtime\\extrator-daemon-runtime-17 run-internal"
        ));
    }

    #[test]
    fn marker_alone_is_not_enough() {
        assert!(!is_daemon_command_line("vim run-internal-notes.md"));
        assert!(!is_daemon_command_line("python run-internal"));
    }

    #[test]
    fn other_extrator_invocations_do_not_match() {
        assert!(!is_daemon_command_line("/usr/local/bin/extrator status"));
        assert!(!is_daemon_command_line(""));
    }

    #[test]
    fn prune_keeps_only_the_newest_runtime_copies() {
        let tmp = tempdir().expect("tempdir");
        let dir = tmp.path();
        let mut copies = Vec::new();
        for i in 0..5 {
            let path = dir.join(format!("{RUNTIME_BIN_PREFIX}-{i}"));
            fs::write(&path, b"bin").expect("write");
            // Spread modification times so ordering is deterministic.
            let mtime = std::time::SystemTime::UNIX_EPOCH
                + std::time::Duration::from_secs(1_000 + i as u64);
            let file = fs::File::options().write(true).open(&path).expect("open");
            file.set_modified(mtime).expect("set mtime");
            copies.push(path);
        }
        let unrelated = dir.join("outro-arquivo");
        fs::write(&unrelated, b"keep").expect("write");

        prune_runtime_binaries(dir, copies.last().expect("copies"));

        let survivors: Vec<_> = copies.iter().filter(|path| path.exists()).collect();
        assert_eq!(survivors.len(), MAX_RUNTIME_BINARIES);
        assert!(copies[0..2].iter().all(|path| !path.exists()));
        assert!(unrelated.exists());
    }
}
