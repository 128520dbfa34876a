use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtratorError {
    #[error("daemon process died during startup; check {}", .0.display())]
    DaemonStartFailed(PathBuf),
    #[error("daemon processes still alive after forced termination: {0:?}")]
    DaemonStopIncomplete(Vec<u32>),
}
