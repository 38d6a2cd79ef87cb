//! Persistence hook for successful extractions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricewatch_core::PriceExtractionResult;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write price record to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize price record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A successful extraction ready to be stored.
#[derive(Debug, Clone, Serialize)]
pub struct PriceRecord {
    pub id: Uuid,
    pub url: String,
    pub checked_at: DateTime<Utc>,
    pub result: PriceExtractionResult,
}

impl PriceRecord {
    #[must_use]
    pub fn new(result: PriceExtractionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: result.url.clone(),
            checked_at: Utc::now(),
            result,
        }
    }
}

/// Receives every successful result. Failures are the caller's to log.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, record: &PriceRecord) -> Result<(), SinkError>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    async fn store(&self, record: &PriceRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }
}
