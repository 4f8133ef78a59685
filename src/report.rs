//! Per-run text reports.
//!
//! # Layout
//!
//! ```text
//! Model: <model>-<quantization>
//! Device: <device>
//! Duration: <seconds, 2 decimals> s
//! Token count: <tokens>
//! Tokens/sec: <rate, 2 decimals>
//!
//! --- Output ---
//! <sanitized output>
//! ```
//!
//! Reports are written once and never appended to; a name collision gets a
//! numeric suffix instead of overwriting the earlier file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::RunDescriptor;
use crate::error::{BenchError, BenchResult};
use crate::sanitize::sanitize;
use crate::throughput::measure;

const OUTPUT_MARKER: &str = "--- Output ---";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Outcome of one completed invocation, ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub duration_s: f64,
    pub token_count: usize,
    pub tokens_per_second: f64,
    pub output: String,
}

impl RunResult {
    /// Sanitize `raw` and measure it against the wall-clock duration.
    pub fn from_raw(raw: &str, duration_s: f64) -> Self {
        let output = sanitize(raw);
        let t = measure(&output, duration_s);
        Self {
            duration_s: duration_s.max(0.0),
            token_count: t.token_count,
            tokens_per_second: t.tokens_per_second,
            output,
        }
    }
}

pub fn render(run: &RunDescriptor, result: &RunResult) -> String {
    format!(
        "Model: {}\nDevice: {}\nDuration: {:.2} s\nToken count: {}\nTokens/sec: {:.2}\n\n{}\n{}\n",
        run.model_id(),
        run.device,
        result.duration_s,
        result.token_count,
        result.tokens_per_second,
        OUTPUT_MARKER,
        result.output,
    )
}

/// `<model>_<quant>_<device>_<YYYYmmdd_HHMMSS>.txt`, with `:` in the model name made path-safe.
pub fn file_name(run: &RunDescriptor, at: &DateTime<Local>) -> String {
    format!(
        "{}_{}_{}_{}.txt",
        run.model.replace(':', "_"),
        run.quantization,
        run.device,
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Write the report into `dir`, returning the path actually used.
pub fn write_report(
    dir: &Path,
    run: &RunDescriptor,
    result: &RunResult,
    at: &DateTime<Local>,
) -> BenchResult<PathBuf> {
    let body = render(run, result);
    let base = file_name(run, at);
    let stem = base.trim_end_matches(".txt");

    let mut attempt = 0u32;
    loop {
        let path = if attempt == 0 {
            dir.join(&base)
        } else {
            dir.join(format!("{stem}-{attempt}.txt"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                fill_or_discard(file, &path, body.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => return Err(BenchError::ReportWrite { path, source }),
        }
    }
}

/// Write `body` into the freshly created file at `path`; a partial report is removed.
fn fill_or_discard<W: Write>(mut file: W, path: &Path, body: &[u8]) -> BenchResult<()> {
    match file.write_all(body).and_then(|_| file.flush()) {
        Ok(()) => Ok(()),
        Err(source) => {
            drop(file);
            let _ = fs::remove_file(path);
            Err(BenchError::ReportWrite {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Header fields recovered from a report on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub model_id: String,
    pub device: String,
    pub duration_s: f64,
    pub token_count: usize,
    pub tokens_per_second: f64,
    pub output: String,
}

pub fn parse_report(path: &Path, text: &str) -> BenchResult<ParsedReport> {
    let malformed = |reason: &str| BenchError::ReportParse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let (header, output) = text
        .split_once(&format!("\n{OUTPUT_MARKER}\n"))
        .ok_or_else(|| malformed("missing output marker"))?;

    let mut lines = header.lines();
    let mut field = |label: &str| -> BenchResult<String> {
        lines
            .next()
            .and_then(|l| l.strip_prefix(label))
            .map(|v| v.trim().to_string())
            .ok_or_else(|| malformed(&format!("missing `{label}` line")))
    };

    let model_id = field("Model:")?;
    let device = field("Device:")?;
    let duration = field("Duration:")?;
    let tokens = field("Token count:")?;
    let rate = field("Tokens/sec:")?;

    let duration_s = duration
        .trim_end_matches('s')
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed("bad duration"))?;
    let token_count = tokens
        .parse::<usize>()
        .map_err(|_| malformed("bad token count"))?;
    let tokens_per_second = rate.parse::<f64>().map_err(|_| malformed("bad rate"))?;

    Ok(ParsedReport {
        model_id,
        device,
        duration_s,
        token_count,
        tokens_per_second,
        output: output.strip_suffix('\n').unwrap_or(output).to_string(),
    })
}
