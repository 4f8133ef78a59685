//! Rebuild run records from report files already on disk.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{BenchError, BenchResult};
use crate::report::parse_report;
use crate::schema::{RunRecord, RunStatus};

/// Scan `dir` for `*.txt` reports and parse each header into a [`RunRecord`].
///
/// Files that don't parse as reports are skipped. Results are sorted by path.
pub fn summarize(dir: &Path) -> BenchResult<Vec<RunRecord>> {
    if !dir.is_dir() {
        return Err(BenchError::Config(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut records = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| BenchError::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt")
        {
            continue;
        }

        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        match parse_report(path, &text) {
            Ok(parsed) => {
                let (model, quantization) = split_model_id(&parsed.model_id);
                records.push(RunRecord {
                    model,
                    quantization,
                    device: parsed.device,
                    model_id: parsed.model_id,
                    status: RunStatus::Completed,
                    duration_s: Some(parsed.duration_s),
                    token_count: Some(parsed.token_count),
                    tokens_per_second: Some(parsed.tokens_per_second),
                    report_path: Some(path.to_path_buf()),
                    error: None,
                });
            }
            Err(e) => debug!("skipping {}: {e}", path.display()),
        }
    }
    Ok(records)
}

/// Split `model-quant` at the last `-`; quantization tags never contain one.
fn split_model_id(model_id: &str) -> (String, String) {
    match model_id.rsplit_once('-') {
        Some((model, quant)) => (model.to_string(), quant.to_string()),
        None => (model_id.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunDescriptor;
    use crate::report::{write_report, RunResult};
    use crate::Device;
    use chrono::Local;
    use tempfile::tempdir;

    #[test]
    fn collects_reports_and_skips_other_files() {
        let dir = tempdir().unwrap();
        let run = RunDescriptor {
            model: "llama3.2:3b-instruct".to_string(),
            quantization: "fp16".to_string(),
            device: Device::Cpu,
            prompt: String::new(),
        };
        write_report(dir.path(), &run, &RunResult::from_raw("a b c d", 2.0), &Local::now())
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "scratch").unwrap();
        fs::write(dir.path().join("summary.json"), "{}").unwrap();

        let records = summarize(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.model, "llama3.2:3b-instruct");
        assert_eq!(r.quantization, "fp16");
        assert_eq!(r.device, "cpu");
        assert_eq!(r.token_count, Some(4));
        assert_eq!(r.tokens_per_second, Some(2.0));
    }

    #[test]
    fn rejects_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(summarize(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn model_id_split() {
        assert_eq!(
            split_model_id("llama3.2:1b-instruct-q4_K_M"),
            ("llama3.2:1b-instruct".to_string(), "q4_K_M".to_string())
        );
        assert_eq!(split_model_id("plain"), ("plain".to_string(), String::new()));
    }
}
