use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::core::PulseError;

/// Append-only newline-delimited JSON log with one record per fetch cycle:
/// `{"timestamp": "YYYY-MM-DD HH:MM:SS", "data": <payload>}` (local time).
#[derive(Debug, Clone)]
pub struct FetchJournal {
    path: PathBuf,
}

#[derive(Serialize)]
struct Record<'a, T> {
    timestamp: String,
    data: &'a T,
}

impl FetchJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record. Failures are logged and swallowed.
    pub async fn append<T: Serialize>(&self, data: &T) {
        if let Err(e) = self.try_append(data).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append fetch journal");
        }
    }

    async fn try_append<T: Serialize>(&self, data: &T) -> Result<(), PulseError> {
        let record = Record {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            data,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
