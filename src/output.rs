use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::app::{ExportResult, IndexReport, ProgressEvent, ProgressSink, Stats, TransformSummary};
use crate::error::GideError;

pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Utf8Path, value: &T) -> Result<(), GideError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| GideError::Filesystem(format!("create {parent}: {err}")))?;

    let mut temp = tempfile::Builder::new()
        .prefix("gide-search")
        .suffix(".json.tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GideError::Filesystem(err.to_string()))?;
    serde_json::to_writer_pretty(&mut temp, value)
        .map_err(|err| GideError::Filesystem(format!("serialize {path}: {err}")))?;
    temp.write_all(b"\n")
        .map_err(|err| GideError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| GideError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_transform(result: &TransformSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_transforms(results: &[TransformSummary]) -> io::Result<()> {
        Self::print_json(results)
    }

    pub fn print_stats(result: &Stats) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_index(result: &IndexReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_export(result: &ExportResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}
