/*
    spotify-features-rs | Rust CLI tool to export track metadata and audio features.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use crate::models::EnrichedRow;
use log::info;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// File name of the exported report.
pub const REPORT_FILE_NAME: &str = "tracks_with_features.csv";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: the report has no rows to derive a header from")]
    EmptyReport,
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e.to_string())
    }
}

/// How fields are written.
///
/// `Never` writes values verbatim: a value containing a comma, quote or
/// newline corrupts its row. That is the historical format of this report
/// and stays the default. `Rfc4180` quotes such values instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsvQuoting {
    #[default]
    Never,
    Rfc4180,
}

impl From<CsvQuoting> for csv::QuoteStyle {
    fn from(quoting: CsvQuoting) -> Self {
        match quoting {
            CsvQuoting::Never => csv::QuoteStyle::Never,
            CsvQuoting::Rfc4180 => csv::QuoteStyle::Necessary,
        }
    }
}

/// Header from the first row's keys, then one line per row in that key
/// order. Lines are separated by `\n`; there is no trailing newline.
pub fn serialize_to_csv(rows: &[EnrichedRow], quoting: CsvQuoting) -> Result<String, ExportError> {
    let first = rows.first().ok_or(ExportError::EmptyReport)?;
    let header: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut writer = csv::WriterBuilder::new()
        .quote_style(quoting.into())
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(
            header
                .iter()
                .map(|key| row.get(key).map(render_value).unwrap_or_default()),
        )?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| ExportError::Csv(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Somewhere to save a named artifact. The native stand-in for a browser download.
pub trait ArtifactSink: Send + Sync {
    /// Saves `bytes` under `name` and returns where it went.
    fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError>;
}

/// Writes artifacts into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactSink for FileSink {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
            return Err(ExportError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<(String, Vec<u8>)> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ArtifactSink for MemorySink {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        self.artifacts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(name))
    }
}

/// Hands the serialized report to `sink`.
pub fn trigger_download(
    sink: &dyn ArtifactSink,
    csv_text: &str,
    filename: &str,
) -> Result<PathBuf, ExportError> {
    let location = sink.save(filename, csv_text.as_bytes())?;
    info!("Saved {} bytes to {}", csv_text.len(), location.display());
    Ok(location)
}
