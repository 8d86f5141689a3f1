//! Config writer collaborator
//!
//! The dispatcher hands every changed declaration to a [`ConfigWriter`] and
//! moves on. [`FileConfigWriter`] persists it from a background task so the
//! caller never waits on disk I/O.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::{AgentError, Result};

/// Sink for serialized declarations.
#[async_trait]
pub trait ConfigWriter: Send + Sync {
    /// Queue a serialized declaration for persistence.
    async fn write(&self, declaration: String) -> Result<()>;

    /// End the writer's lifecycle; later writes are rejected.
    async fn stop(&self);
}

/// Writes each declaration to a single file, replacing it atomically.
pub struct FileConfigWriter {
    path: PathBuf,
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for FileConfigWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigWriter").field("path", &self.path).finish()
    }
}

impl FileConfigWriter {
    /// Start the background writer. Must be called inside a tokio runtime.
    pub fn start(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

        let target = path.clone();
        let worker = tokio::spawn(async move {
            while let Some(declaration) = receiver.recv().await {
                match write_atomically(&target, &declaration).await {
                    Ok(()) => debug!(path = %target.display(), bytes = declaration.len(), "Declaration written"),
                    Err(e) => error!(path = %target.display(), error = %e, "Failed to write declaration"),
                }
            }
            debug!(path = %target.display(), "Config writer drained");
        });

        info!(path = %path.display(), "Config writer started");

        Self { path, sender: Mutex::new(Some(sender)), worker: Mutex::new(Some(worker)) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigWriter for FileConfigWriter {
    async fn write(&self, declaration: String) -> Result<()> {
        let sender = self.sender.lock().expect("writer lock poisoned");
        match sender.as_ref() {
            Some(sender) => sender
                .send(declaration)
                .map_err(|_| AgentError::writer("Config writer task is no longer running")),
            None => Err(AgentError::writer("Config writer has been stopped")),
        }
    }

    async fn stop(&self) {
        // Dropping the sender lets the worker drain queued writes and exit
        let sender = self.sender.lock().expect("writer lock poisoned").take();
        drop(sender);

        let worker = self.worker.lock().expect("writer lock poisoned").take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Config writer task failed");
            }
            info!(path = %self.path.display(), "Config writer stopped");
        }
    }
}

async fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| AgentError::io(e, format!("Failed to write {}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AgentError::io(e, format!("Failed to replace {}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_stop_persists_last_declaration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("declaration.json");
        let writer = FileConfigWriter::start(&path);

        writer.write("{\"n\":1}".to_string()).await.unwrap();
        writer.write("{\"n\":2}".to_string()).await.unwrap();
        writer.stop().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"n\":2}");
        assert!(!dir.path().join("declaration.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_after_stop_is_rejected() {
        let dir = TempDir::new().unwrap();
        let writer = FileConfigWriter::start(dir.path().join("declaration.json"));
        writer.stop().await;

        let result = writer.write("{}".to_string()).await;
        assert!(matches!(result, Err(AgentError::Writer { .. })));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let writer = FileConfigWriter::start(dir.path().join("declaration.json"));
        writer.stop().await;
        writer.stop().await;
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_fail_caller() {
        let dir = TempDir::new().unwrap();
        let writer = FileConfigWriter::start(dir.path().join("missing").join("declaration.json"));

        assert!(writer.write("{}".to_string()).await.is_ok());
        writer.stop().await;
        assert!(!dir.path().join("missing").exists());
    }
}
