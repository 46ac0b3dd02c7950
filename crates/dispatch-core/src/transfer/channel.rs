//! Transfer channel port and the mounted-directory adapter

use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use log::debug;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

const PARTIAL_SUFFIX: &str = "part";

/// Run a transfer call under `timeout`. Elapsing counts as a transient failure.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| DispatchError::Timeout(timeout))?
}

/// Opens sessions against the vendor's file drop
#[async_trait]
pub trait TransferChannel: Send + Sync {
    /// Open a session for one cycle. The session is released when dropped.
    async fn connect(&self) -> Result<Box<dyn TransferSession>>;
}

/// One open connection to the vendor's upload and report directories
#[async_trait]
pub trait TransferSession: Send {
    async fn is_reachable(&mut self) -> Result<bool>;

    /// Store `content` under `file_name` in the upload directory. A partially
    /// written file must never be visible under its final name.
    async fn upload(&mut self, file_name: &str, content: &[u8]) -> Result<()>;

    /// Paths of the report files currently available
    async fn list_reports(&mut self) -> Result<Vec<String>>;

    async fn download(&mut self, path: &str) -> Result<Vec<u8>>;

    async fn delete_report(&mut self, path: &str) -> Result<()>;
}

/// Channel backed by directories on a mounted file system
#[derive(Debug, Clone)]
pub struct LocalDirectoryChannel {
    upload_dir: PathBuf,
    report_dir: PathBuf,
    report_extension: String,
}

impl LocalDirectoryChannel {
    pub fn new(upload_dir: impl Into<PathBuf>, report_dir: impl Into<PathBuf>, report_extension: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            report_dir: report_dir.into(),
            report_extension: report_extension.into(),
        }
    }
}

#[async_trait]
impl TransferChannel for LocalDirectoryChannel {
    async fn connect(&self) -> Result<Box<dyn TransferSession>> {
        debug!("Opening local transfer session on {}", self.upload_dir.display());
        Ok(Box::new(LocalDirectorySession {
            channel: self.clone(),
        }))
    }
}

struct LocalDirectorySession {
    channel: LocalDirectoryChannel,
}

impl LocalDirectorySession {
    /// Resolve a report path, refusing anything outside the report directory
    fn report_path(&self, path: &str) -> Result<PathBuf> {
        let candidate = Path::new(path);
        let file_name = candidate
            .file_name()
            .ok_or_else(|| DispatchError::Transfer(format!("Invalid report path: {}", path)))?;
        Ok(self.channel.report_dir.join(file_name))
    }
}

#[async_trait]
impl TransferSession for LocalDirectorySession {
    async fn is_reachable(&mut self) -> Result<bool> {
        for dir in [&self.channel.upload_dir, &self.channel.report_dir] {
            match fs::metadata(dir).await {
                Ok(meta) if meta.is_dir() => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    async fn upload(&mut self, file_name: &str, content: &[u8]) -> Result<()> {
        // Must be a bare file name, never a path into or out of the upload directory
        if Path::new(file_name).file_name().and_then(|name| name.to_str()) != Some(file_name) {
            return Err(DispatchError::Validation(format!("Refusing to upload to '{}'", file_name)));
        }

        let final_path = self.channel.upload_dir.join(file_name);
        let partial_path = self
            .channel
            .upload_dir
            .join(format!("{}.{}", file_name, PARTIAL_SUFFIX));

        if let Err(e) = fs::write(&partial_path, content).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(DispatchError::Transfer(format!("Failed to write {}: {}", file_name, e)));
        }

        fs::rename(&partial_path, &final_path)
            .await
            .map_err(|e| DispatchError::Transfer(format!("Failed to publish {}: {}", file_name, e)))?;

        debug!("Uploaded {} ({} bytes)", final_path.display(), content.len());
        Ok(())
    }

    async fn list_reports(&mut self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.channel.report_dir).await?;
        let mut reports = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_report = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(&self.channel.report_extension))
                .unwrap_or(false);

            if is_report && entry.file_type().await?.is_file() {
                reports.push(path.to_string_lossy().into_owned());
            }
        }

        reports.sort();
        Ok(reports)
    }

    async fn download(&mut self, path: &str) -> Result<Vec<u8>> {
        let path = self.report_path(path)?;
        Ok(fs::read(&path).await?)
    }

    async fn delete_report(&mut self, path: &str) -> Result<()> {
        let path = self.report_path(path)?;
        fs::remove_file(&path).await?;
        debug!("Deleted report {}", path.display());
        Ok(())
    }
}
