#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! JSON-lines logging shared by the policy, simulation, and CLI crates.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Log severity level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Per-step diagnostics.
    Debug,
    /// Progress and lifecycle events.
    Info,
    /// Recoverable anomalies.
    Warn,
    /// Failures.
    Error,
}

/// One structured log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Time the record was created.
    pub timestamp: DateTime<Utc>,
    /// Component emitting the record (e.g. `trainer`).
    pub component: String,
    /// Severity.
    pub level: LogLevel,
    /// Short dotted message such as `training.progress`.
    pub message: String,
    /// Structured fields attached to the record.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(component: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            component: component.into(),
            level,
            message: message.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Merges the fields of a JSON object into the metadata. Non-object values are ignored.
    #[must_use]
    pub fn with_metadata(mut self, metadata: &serde_json::Value) -> Self {
        if let Some(obj) = metadata.as_object() {
            self.metadata
                .extend(obj.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }
}

/// Append-only JSON-lines writer.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    writer: Mutex<File>,
}

impl JsonLogger {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log dir {}", parent.display()))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Writes a log record as one line.
    pub fn log(&self, record: &LogRecord) -> Result<()> {
        self.append(record)
    }

    /// Writes any serializable value as one line.
    pub fn append<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads every line of a JSON-lines file. A missing file yields an empty list.
pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("opening log {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .with_context(|| format!("decoding line {} of {}", idx + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_json_lines() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("nested/train.log")).unwrap();
        logger
            .log(&LogRecord::new("trainer", LogLevel::Info, "training.start"))
            .unwrap();
        let content = fs::read_to_string(logger.path()).unwrap();
        assert!(content.contains("\"message\":\"training.start\""));
        assert!(content.contains("\"level\":\"INFO\""));
    }

    #[test]
    fn reads_back_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.log");
        let logger = JsonLogger::new(&path).unwrap();
        let record = LogRecord::new("trainer", LogLevel::Debug, "episode")
            .with_metadata(&json!({ "episode": 3, "reward": 12.5 }));
        logger.log(&record).unwrap();
        logger.append(&json!({ "free": "form" })).unwrap();

        let records: Vec<serde_json::Value> = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["metadata"]["episode"], 3);
        assert_eq!(records[1]["free"], "form");
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let records: Vec<LogRecord> = read_records(dir.path().join("absent.log")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
