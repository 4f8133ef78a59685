use clap::{Args as ClapArgs, Parser, Subcommand};
use ollama_quant_bench::config::{Overrides, SweepConfig};
use ollama_quant_bench::harness::{decode_output, ProcessRunner};
use ollama_quant_bench::sanitize::sanitize;
use ollama_quant_bench::schema::{SweepMeta, SweepReport, SCHEMA_VERSION};
use ollama_quant_bench::summarize::summarize;
use ollama_quant_bench::sweep::Sweep;
use ollama_quant_bench::throughput::measure;
use ollama_quant_bench::{BenchError, BenchResult, Device};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(ClapArgs, Debug, Default)]
struct SweepArgs {
    /// JSON sweep configuration; omitted fields use the built-in table.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Runner executable (invoked as `<runner> run <model>-<quant>`).
    #[arg(long, value_name = "PROG")]
    runner: Option<String>,

    /// Per-run timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory that receives the per-run text reports.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Only benchmark these devices. Can be provided multiple times.
    #[arg(long, value_enum, action = clap::ArgAction::Append)]
    device: Vec<Device>,

    /// Only benchmark these model names. Can be provided multiple times.
    #[arg(long, value_name = "NAME", action = clap::ArgAction::Append)]
    model: Vec<String>,
}

impl SweepArgs {
    fn resolve(&self) -> BenchResult<SweepConfig> {
        let base = match &self.config {
            Some(path) => SweepConfig::from_path(path)?,
            None => SweepConfig::default(),
        };
        Ok(base.with_overrides(Overrides {
            program: self.runner.clone(),
            timeout_secs: self.timeout_secs,
            output_dir: self.output_dir.clone(),
            devices: self.device.clone(),
            models: self.model.clone(),
        }))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the model x quantization x device sweep (default).
    Run(SweepArgs),

    /// Sanitize raw runner output and print the cleaned text.
    ///
    /// Reads stdin unless --input is given; the token count goes to stderr.
    Sanitize {
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Wall-clock seconds to compute a rate against.
        #[arg(long, default_value_t = 0.0)]
        duration: f64,
    },

    /// Rebuild a JSON summary from reports already on disk.
    Summarize {
        #[arg(long, value_name = "DIR", default_value = "results")]
        dir: PathBuf,
    },

    /// Print the effective sweep configuration as JSON.
    ShowConfig(SweepArgs),
}

#[derive(Parser, Debug)]
#[command(name = "ollama-quant-bench")]
#[command(about = "Throughput sweep for a local LLM runner across models, quantizations and devices")]
struct Args {
    /// Where to write the JSON summary. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> BenchResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn run(args: Args) -> BenchResult<bool> {
    let out = args.out.as_deref();
    match args.cmd.unwrap_or(Command::Run(SweepArgs::default())) {
        Command::Run(sweep_args) => {
            let cfg = sweep_args.resolve()?;
            let runner = ProcessRunner::new(cfg.runner.clone());
            let report = Sweep::new(cfg, runner).run()?;
            emit(&report, out)?;
            Ok(!report.has_failures())
        }
        Command::Sanitize { input, duration } => {
            let raw = match input {
                Some(path) => fs::read(path)?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let clean = sanitize(&decode_output(&raw, &[]));
            let t = measure(&clean, duration);
            println!("{clean}");
            eprintln!(
                "Token count: {}\nTokens/sec: {:.2}",
                t.token_count, t.tokens_per_second
            );
            Ok(true)
        }
        Command::Summarize { dir } => {
            let runs = summarize(&dir)?;
            let report = SweepReport {
                run: SweepMeta {
                    schema_version: SCHEMA_VERSION,
                    bench_version: env!("CARGO_PKG_VERSION").to_string(),
                    timestamp_utc: chrono::Utc::now()
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                    runner: String::new(),
                    prompt: String::new(),
                },
                runs,
            };
            emit(&report, out)?;
            Ok(true)
        }
        Command::ShowConfig(sweep_args) => {
            let cfg = sweep_args.resolve()?;
            cfg.validate()?;
            emit(&cfg, out)?;
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::error!("one or more runs failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{e}");
            if let BenchError::Config(_) = e {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
