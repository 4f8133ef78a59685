use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while configuring or running a benchmark sweep.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to spawn runner `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Runner timed out after {secs}s on {model_id} ({device})", secs = .timeout.as_secs())]
    Timeout {
        model_id: String,
        device: String,
        timeout: Duration,
    },

    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed report {path}: {reason}")]
    ReportParse { path: PathBuf, reason: String },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BenchError {
    /// Timeouts are the one expected failure; everything else is surfaced as a fault.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BenchError::Timeout { .. })
    }
}

/// Result type for benchmark operations
pub type BenchResult<T> = Result<T, BenchError>;
