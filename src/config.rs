//! Sweep configuration: which models, quantizations and devices to benchmark,
//! the prompt fed to every run, and how the runner process is invoked.
//!
//! A [`SweepConfig`] is built once at startup (defaults, optionally a JSON
//! file, then CLI overrides) and handed to the sweep as an immutable value.

use crate::error::{BenchError, BenchResult};
use crate::Device;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable the runner reads to pick its execution device.
pub const DEFAULT_DEVICE_ENV: &str = "OLLAMA_DEFAULT_DEVICE";
pub const DEFAULT_PROGRAM: &str = "ollama";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_PROMPT: &str = "What is federated learning?";
pub const DEFAULT_OUTPUT_DIR: &str = "results";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub quantizations: Vec<String>,
}

impl ModelSpec {
    pub fn new(name: &str, quantizations: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            quantizations: quantizations.iter().map(|q| q.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Runner executable; invoked as `<program> run <model>-<quantization>`.
    pub program: String,
    pub device_env: String,
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            device_env: DEFAULT_DEVICE_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub models: Vec<ModelSpec>,
    pub devices: Vec<Device>,
    pub prompt: String,
    pub runner: RunnerConfig,
    pub output_dir: PathBuf,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            models: vec![
                ModelSpec::new("llama3.2:1b-instruct", &["q4_K_M", "q8_0", "fp16"]),
                ModelSpec::new("llama3.2:3b-instruct", &["q4_K_M", "q8_0", "fp16"]),
            ],
            devices: vec![Device::Gpu, Device::Cpu],
            prompt: DEFAULT_PROMPT.to_string(),
            runner: RunnerConfig::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Command-line adjustments layered over a loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub program: Option<String>,
    pub timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
    /// Keep only these devices (empty keeps all).
    pub devices: Vec<Device>,
    /// Keep only these model names (empty keeps all).
    pub models: Vec<String>,
}

impl SweepConfig {
    /// Load a JSON configuration; omitted fields fall back to the defaults.
    pub fn from_path(path: &Path) -> BenchResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let cfg: SweepConfig = serde_json::from_str(&text)?;
        Ok(cfg)
    }

    pub fn with_overrides(mut self, o: Overrides) -> Self {
        if let Some(program) = o.program {
            self.runner.program = program;
        }
        if let Some(secs) = o.timeout_secs {
            self.runner.timeout_secs = secs;
        }
        if let Some(dir) = o.output_dir {
            self.output_dir = dir;
        }
        if !o.devices.is_empty() {
            self.devices.retain(|d| o.devices.contains(d));
        }
        if !o.models.is_empty() {
            self.models.retain(|m| o.models.contains(&m.name));
        }
        self
    }

    pub fn validate(&self) -> BenchResult<()> {
        if self.models.is_empty() {
            return Err(BenchError::Config("no models to benchmark".to_string()));
        }
        if let Some(m) = self.models.iter().find(|m| m.quantizations.is_empty()) {
            return Err(BenchError::Config(format!(
                "model {} lists no quantizations",
                m.name
            )));
        }
        if self.devices.is_empty() {
            return Err(BenchError::Config("no devices to benchmark".to_string()));
        }
        if self.runner.program.trim().is_empty() {
            return Err(BenchError::Config("runner program is empty".to_string()));
        }
        if self.runner.device_env.is_empty() || self.runner.device_env.contains('=') {
            return Err(BenchError::Config(format!(
                "invalid device environment variable name: {:?}",
                self.runner.device_env
            )));
        }
        if self.runner.timeout_secs == 0 {
            return Err(BenchError::Config("timeout must be at least 1s".to_string()));
        }
        Ok(())
    }

    /// Every (model, quantization, device) triple, model-major.
    pub fn descriptors(&self) -> impl Iterator<Item = RunDescriptor> + '_ {
        self.models.iter().flat_map(move |model| {
            model.quantizations.iter().flat_map(move |quant| {
                self.devices.iter().map(move |device| RunDescriptor {
                    model: model.name.clone(),
                    quantization: quant.clone(),
                    device: *device,
                    prompt: self.prompt.clone(),
                })
            })
        })
    }

    pub fn run_count(&self) -> usize {
        self.models
            .iter()
            .map(|m| m.quantizations.len() * self.devices.len())
            .sum()
    }
}

/// One benchmark invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    pub model: String,
    pub quantization: String,
    pub device: Device,
    pub prompt: String,
}

impl RunDescriptor {
    /// Tag passed to the runner, e.g. `llama3.2:1b-instruct-q8_0`.
    pub fn model_id(&self) -> String {
        format!("{}-{}", self.model, self.quantization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_table_has_twelve_runs() {
        let cfg = SweepConfig::default();
        assert_eq!(cfg.run_count(), 12);
        assert_eq!(cfg.descriptors().count(), 12);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn descriptors_are_model_major_device_minor() {
        let cfg = SweepConfig::default();
        let ids: Vec<(String, Device)> = cfg
            .descriptors()
            .take(3)
            .map(|d| (d.model_id(), d.device))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("llama3.2:1b-instruct-q4_K_M".to_string(), Device::Gpu),
                ("llama3.2:1b-instruct-q4_K_M".to_string(), Device::Cpu),
                ("llama3.2:1b-instruct-q8_0".to_string(), Device::Gpu),
            ]
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        fs::write(
            &path,
            r#"{
                "models": [{"name": "qwen2:0.5b", "quantizations": ["q4_0"]}],
                "devices": ["cpu"],
                "runner": {"timeout_secs": 60}
            }"#,
        )
        .unwrap();

        let cfg = SweepConfig::from_path(&path).unwrap();
        assert_eq!(cfg.models, vec![ModelSpec::new("qwen2:0.5b", &["q4_0"])]);
        assert_eq!(cfg.devices, vec![Device::Cpu]);
        assert_eq!(cfg.prompt, DEFAULT_PROMPT);
        assert_eq!(cfg.runner.program, "ollama");
        assert_eq!(cfg.runner.device_env, "OLLAMA_DEFAULT_DEVICE");
        assert_eq!(cfg.runner.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn unknown_device_in_json_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"devices": ["tpu"]}"#).unwrap();
        assert!(matches!(
            SweepConfig::from_path(&path),
            Err(BenchError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let err = SweepConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn overrides_filter_and_replace() {
        let cfg = SweepConfig::default().with_overrides(Overrides {
            program: Some("/opt/ollama".to_string()),
            timeout_secs: Some(5),
            output_dir: Some(PathBuf::from("out")),
            devices: vec![Device::Cpu],
            models: vec!["llama3.2:3b-instruct".to_string()],
        });
        assert_eq!(cfg.runner.program, "/opt/ollama");
        assert_eq!(cfg.runner.timeout_secs, 5);
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.devices, vec![Device::Cpu]);
        assert_eq!(cfg.models.len(), 1);
        assert_eq!(cfg.run_count(), 3);
    }

    #[test]
    fn validation_rejects_empty_sweeps() {
        let mut cfg = SweepConfig::default();
        cfg.devices.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = SweepConfig::default();
        cfg.models[1].quantizations.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = SweepConfig::default();
        cfg.runner.timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let cfg = SweepConfig::default().with_overrides(Overrides {
            models: vec!["mistral".to_string()],
            ..Default::default()
        });
        assert!(cfg.validate().is_err());
    }
}
