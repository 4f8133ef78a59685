use std::fs;
use std::path::PathBuf;

use chrono::{Local, SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::config::{RunDescriptor, SweepConfig};
use crate::error::BenchResult;
use crate::harness::ModelRunner;
use crate::report::{self, RunResult};
use crate::schema::{RunRecord, RunStatus, SweepMeta, SweepReport, SCHEMA_VERSION};

/// Runs every configured (model, quantization, device) triple, one at a time.
pub struct Sweep<R> {
    config: SweepConfig,
    runner: R,
}

impl<R: ModelRunner> Sweep<R> {
    pub fn new(config: SweepConfig, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn run(&self) -> BenchResult<SweepReport> {
        self.config.validate()?;
        fs::create_dir_all(&self.config.output_dir)?;

        info!(
            runs = self.config.run_count(),
            output_dir = %self.config.output_dir.display(),
            "starting sweep"
        );

        let runs = self
            .config
            .descriptors()
            .map(|run| self.run_one(&run))
            .collect::<Vec<_>>();

        let report = SweepReport {
            run: SweepMeta {
                schema_version: SCHEMA_VERSION,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                runner: self.config.runner.program.clone(),
                prompt: self.config.prompt.clone(),
            },
            runs,
        };

        info!(
            completed = report.count(RunStatus::Completed),
            timed_out = report.count(RunStatus::TimedOut),
            failed = report.count(RunStatus::Failed),
            "sweep finished"
        );
        Ok(report)
    }

    fn run_one(&self, run: &RunDescriptor) -> RunRecord {
        let model_id = run.model_id();
        info!(model = %model_id, device = %run.device, "running");

        let mut record = RunRecord {
            model: run.model.clone(),
            quantization: run.quantization.clone(),
            device: run.device.to_string(),
            model_id,
            status: RunStatus::Failed,
            duration_s: None,
            token_count: None,
            tokens_per_second: None,
            report_path: None,
            error: None,
        };

        match self.execute(run) {
            Ok((result, path)) => {
                info!(
                    tokens = result.token_count,
                    duration_s = format_args!("{:.2}", result.duration_s),
                    tokens_per_s = format_args!("{:.2}", result.tokens_per_second),
                    report = %path.display(),
                    "done"
                );
                record.status = RunStatus::Completed;
                record.duration_s = Some(result.duration_s);
                record.token_count = Some(result.token_count);
                record.tokens_per_second = Some(result.tokens_per_second);
                record.report_path = Some(path);
            }
            Err(e) if e.is_timeout() => {
                warn!(model = %record.model_id, device = %record.device, "{e}; skipping");
                record.status = RunStatus::TimedOut;
                record.error = Some(e.to_string());
            }
            Err(e) => {
                error!(model = %record.model_id, device = %record.device, "{e}");
                record.error = Some(e.to_string());
            }
        }
        record
    }

    fn execute(&self, run: &RunDescriptor) -> BenchResult<(RunResult, PathBuf)> {
        let invocation = self.runner.invoke(run)?;
        if let Some(status) = invocation.status.filter(|s| !s.success()) {
            warn!(model = %run.model_id(), %status, "runner exited unsuccessfully");
        }

        let result = RunResult::from_raw(
            &invocation.combined_text(),
            invocation.elapsed.as_secs_f64(),
        );
        let path = report::write_report(&self.config.output_dir, run, &result, &Local::now())?;
        Ok((result, path))
    }
}
