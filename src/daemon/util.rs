use anyhow::Result;
use std::process::{Command, Output};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Timestamp format shared by the persisted daemon state, ledger rows and
/// the trailing cycle summary.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Return the current Unix epoch in seconds.
pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Return the current Unix epoch in milliseconds.
pub fn now_epoch_millis() -> Result<u128> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis())
}

/// Split a configured collaborator command into program + arguments.
/// Plain whitespace splitting; quoting is not supported.
pub fn split_command(raw: &str) -> Option<(String, Vec<String>)> {
    let mut parts = raw.split_whitespace().map(ToOwned::to_owned);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Keep at most the last `max_chars` characters of `input`.
pub fn tail_chars(input: &str, max_chars: usize) -> &str {
    let count = input.chars().count();
    if count <= max_chars {
        return input;
    }
    let skip = count - max_chars;
    match input.char_indices().nth(skip) {
        Some((idx, _)) => &input[idx..],
        None => input,
    }
}

pub fn run_command_with_optional_timeout(
    cmd: &mut Command,
    timeout_secs: Option<u64>,
) -> Result<Output> {
    let Some(timeout_secs) = timeout_secs else {
        return Ok(cmd.output()?);
    };
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    let mut child = cmd.spawn()?;
    let started = Instant::now();
    loop {
        if child.try_wait()?.is_some() {
            return Ok(child.wait_with_output()?);
        }
        if started.elapsed() >= Duration::from_secs(timeout_secs) {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("command timed out after {}s", timeout_secs);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::{split_command, tail_chars};

    #[test]
    fn split_command_separates_program_and_args() {
        let (program, args) = split_command("reconciliador --modo pos-ciclo").expect("split");
        assert_eq!(program, "reconciliador");
        assert_eq!(args, vec!["--modo".to_string(), "pos-ciclo".to_string()]);
    }

    #[test]
    fn split_command_rejects_blank_input() {
        assert!(split_command("   ").is_none());
    }

    #[test]
    fn tail_chars_keeps_short_input_intact() {
        assert_eq!(tail_chars("abc", 10), "abc");
    }

    #[test]
    fn tail_chars_keeps_only_the_tail() {
        assert_eq!(tail_chars("abcdef", 2), "ef");
    }
}
