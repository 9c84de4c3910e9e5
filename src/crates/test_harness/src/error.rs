use std::path::PathBuf;

use thiserror::Error;

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while launching an engine process.
///
/// Only configuration problems are errors. Crashes, timeouts and unparseable
/// output are reported through [`crate::Telemetry`] instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to spawn {}: {reason}", program.display())]
    EngineStart { program: PathBuf, reason: String },
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl HarnessError {
    pub(crate) fn engine_start(program: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HarnessError::EngineStart {
            program: program.into(),
            reason: reason.into(),
        }
    }
}
