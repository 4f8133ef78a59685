use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod error;
pub mod harness;
pub mod report;
pub mod sanitize;
pub mod schema;
pub mod summarize;
pub mod sweep;
pub mod throughput;

pub use error::{BenchError, BenchResult};

/// Compute device the runner is asked to execute on.
///
/// The lowercase names are passed verbatim through the runner's device
/// environment variable, so they must stay `gpu` / `cpu`.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Offload to the GPU.
    Gpu,
    /// Force CPU execution.
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Gpu => "gpu",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
