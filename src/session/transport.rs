//! Transport seam between device operations and the live session.
//!
//! Device file operations only ever see this trait, so tests can script a
//! fake device and assert on the exact sequence of commands and transfers.

use crate::error::SyncError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Captured output of one remote command, concatenated at stream close.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout split on newlines, the form listing commands are parsed from.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lines().map(|l| l.to_string()).collect()
    }
}

/// One authenticated remote session, reduced to the three capabilities the
/// sync layer needs: run a command, move a file down, move a file up.
///
/// Implementations do not retry; retry policy belongs to the orchestrator.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Execute a shell command on the device and capture its output.
    async fn execute(&self, command: &str) -> Result<CommandOutput, SyncError>;

    /// Copy one remote file to an existing local path.
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SyncError>;

    /// Copy one local file to a remote path, overwriting blindly.
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), SyncError>;
}

#[async_trait]
impl<T: RemoteTransport + ?Sized> RemoteTransport for Arc<T> {
    async fn execute(&self, command: &str) -> Result<CommandOutput, SyncError> {
        (**self).execute(command).await
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SyncError> {
        (**self).download(remote_path, local_path).await
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), SyncError> {
        (**self).upload(local_path, remote_path).await
    }
}
