use crate::infra::contracts::AuditEntry;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditLoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL audit trail of dispatcher decisions.
pub struct AuditLogger {
    log_path: PathBuf,
    file: Mutex<File>,
}

impl AuditLogger {
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self, AuditLoggerError> {
        let log_path = log_path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            log_path,
            file: Mutex::new(file),
        })
    }

    pub fn log(&self, entry: &AuditEntry) -> Result<(), AuditLoggerError> {
        let json = serde_json::to_string(entry)?;
        let mut file = self.file.lock();
        writeln!(file, "{}", json)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read the trail back, skipping lines that do not parse.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, AuditLoggerError> {
        let _guard = self.file.lock();
        let reader = BufReader::new(File::open(&self.log_path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}
