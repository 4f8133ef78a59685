use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub timestamp_utc: String,
    pub runner: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub model: String,
    pub quantization: String,
    pub device: String,
    pub model_id: String,
    pub status: RunStatus,

    pub duration_s: Option<f64>,
    pub token_count: Option<usize>,
    pub tokens_per_second: Option<f64>,

    pub report_path: Option<PathBuf>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run: SweepMeta,
    pub runs: Vec<RunRecord>,
}

impl SweepReport {
    pub fn count(&self, status: RunStatus) -> usize {
        self.runs.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(RunStatus::Failed) > 0
    }
}
