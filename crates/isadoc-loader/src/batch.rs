// ABOUTME: Converts every instruction document or header in a folder into an emitted YAML file.
// ABOUTME: Per-file failures are logged and collected so one bad input never stops the batch.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use isadoc_core::emit_yaml;
use thiserror::Error;

use crate::{load_record_file, record_kind};

/// Errors that stop a batch before any file is converted.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("input is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// Knobs for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Replace output files that already exist instead of skipping them.
    pub overwrite: bool,
}

/// Outcome of a batch run, in input-file order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Convert each recognized file directly inside `input` to `<output>/<stem>.yaml`.
///
/// Files are processed in file-name order. Unrecognized extensions are
/// ignored; subdirectories are not descended into.
pub fn convert_dir(
    input: &Path,
    output: &Path,
    options: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    if !input.is_dir() {
        return Err(BatchError::NotADirectory(input.to_path_buf()));
    }
    fs::create_dir_all(output)?;

    let mut inputs = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && record_kind(&path).is_some() {
            inputs.push(path);
        }
    }
    inputs.sort();

    let mut report = BatchReport::default();
    for path in inputs {
        let target = output_path(&path, output);
        if target.exists() && !options.overwrite {
            tracing::info!(
                input = %path.display(),
                output = %target.display(),
                "output exists, skipping"
            );
            report.skipped.push(path);
            continue;
        }

        tracing::info!(input = %path.display(), output = %target.display(), "converting");
        match convert_file(&path, &target) {
            Ok(()) => report.converted.push(path),
            Err(message) => {
                tracing::warn!(input = %path.display(), error = %message, "conversion failed");
                report.failed.push((path, message));
            }
        }
    }

    tracing::info!(
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    Ok(report)
}

/// `<output>/<input stem>.yaml`; `fcvt.d.q.h` becomes `fcvt.d.q.yaml`.
pub fn output_path(input: &Path, output: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.join(format!("{stem}.yaml"))
}

fn convert_file(input: &Path, target: &Path) -> Result<(), String> {
    let record = load_record_file(input).map_err(|e| e.to_string())?;

    let result = File::create(target)
        .map_err(|e| e.to_string())
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            emit_yaml(&record, &mut writer).map_err(|e| e.to_string())?;
            writer.flush().map_err(|e| e.to_string())
        });

    if result.is_err() {
        // Drop partial output.
        let _ = fs::remove_file(target);
    }
    result
}
