//! Daily submission log.

use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::TransferError;

/// Append-only record of transfer identifiers, one file per local day.
#[derive(Debug, Clone)]
pub struct SubmissionLog {
    directory: PathBuf,
}

impl SubmissionLog {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `transfers.YYYYMMDD.log` for the given day.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("transfers.{}.log", date.format("%Y%m%d")))
    }

    /// Appends a transfer identifier to today's log.
    pub async fn append(&self, transfer_id: &str) -> Result<PathBuf, TransferError> {
        self.append_on(Local::now().date_naive(), transfer_id).await
    }

    pub async fn append_on(
        &self,
        date: NaiveDate,
        transfer_id: &str,
    ) -> Result<PathBuf, TransferError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| TransferError::io(&self.directory, e))?;

        let path = self.path_for(date);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TransferError::io(&path, e))?;
        file.write_all(format!("{}\n", transfer_id).as_bytes())
            .await
            .map_err(|e| TransferError::io(&path, e))?;
        file.flush().await.map_err(|e| TransferError::io(&path, e))?;

        Ok(path)
    }
}
