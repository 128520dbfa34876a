//! Scoped redirection of the process stdout/stderr into a cycle log.
//!
//! The guard duplicates the original descriptors before pointing fds 1/2
//! at the log file, and restores them on drop, so a panic or early return
//! inside a cycle can never leak captured output into a later cycle.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[cfg(unix)]
pub struct CycleCapture {
    saved_stdout: i32,
    saved_stderr: i32,
}

#[cfg(unix)]
impl CycleCapture {
    pub fn redirect_to(path: &Path) -> Result<Self> {
        use std::os::fd::AsRawFd;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open cycle log {}", path.display()))?;

        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        let saved_stdout = unsafe { libc::dup(libc::STDOUT_FILENO) };
        let saved_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
        if saved_stdout < 0 || saved_stderr < 0 {
            unsafe {
                if saved_stdout >= 0 {
                    libc::close(saved_stdout);
                }
                if saved_stderr >= 0 {
                    libc::close(saved_stderr);
                }
            }
            anyhow::bail!("failed to duplicate standard stream descriptors");
        }

        let fd = file.as_raw_fd();
        let out = unsafe { libc::dup2(fd, libc::STDOUT_FILENO) };
        let err = unsafe { libc::dup2(fd, libc::STDERR_FILENO) };
        if out < 0 || err < 0 {
            unsafe {
                libc::dup2(saved_stdout, libc::STDOUT_FILENO);
                libc::dup2(saved_stderr, libc::STDERR_FILENO);
                libc::close(saved_stdout);
                libc::close(saved_stderr);
            }
            anyhow::bail!(
                "failed to redirect standard streams to {}",
                path.display()
            );
        }

        Ok(Self {
            saved_stdout,
            saved_stderr,
        })
    }
}

#[cfg(unix)]
impl Drop for CycleCapture {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        unsafe {
            libc::dup2(self.saved_stdout, libc::STDOUT_FILENO);
            libc::dup2(self.saved_stderr, libc::STDERR_FILENO);
            libc::close(self.saved_stdout);
            libc::close(self.saved_stderr);
        }
    }
}

#[cfg(not(unix))]
pub struct CycleCapture;

#[cfg(not(unix))]
impl CycleCapture {
    pub fn redirect_to(_path: &Path) -> Result<Self> {
        Ok(Self)
    }
}
