//! Scripted fake device shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use remsync::error::SyncError;
use remsync::session::transport::{CommandOutput, RemoteTransport};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// In-memory device. Listings and file contents are scripted up front; every
/// command and transfer is appended to `log` so tests can assert on the
/// exact sequence.
#[derive(Default)]
pub struct MockTransport {
    listings: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<u8>>,
    existing: Mutex<HashSet<String>>,
    pub log: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the raw `ls -p -1` lines for one remote directory.
    pub fn with_listing(mut self, dir: &str, entries: &[&str]) -> Self {
        self.listings
            .insert(dir.to_string(), entries.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Script the contents served for one remote file.
    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.existing.get_mut().insert(path.to_string());
        self.files.insert(path.to_string(), contents.to_vec());
        self
    }

    /// Mark a remote path as present without scripting contents.
    pub fn with_existing(self, path: &str) -> Self {
        self.existing.lock().insert(path.to_string());
        self
    }

    pub fn log_entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn remote_has(&self, path: &str) -> bool {
        self.existing.lock().contains(path)
    }

    fn record(&self, entry: String) {
        self.log.lock().push(entry);
    }
}

/// Pull the single-quoted argument out of a scripted shell command.
fn quoted_arg(command: &str) -> Option<&str> {
    let start = command.find('\'')? + 1;
    let end = command[start..].find('\'')? + start;
    Some(&command[start..end])
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn execute(&self, command: &str) -> Result<CommandOutput, SyncError> {
        if command.starts_with("ls -p -1 ") {
            let path = quoted_arg(command)
                .ok_or_else(|| SyncError::Dispatch(command.to_string()))?;
            self.record(format!("ls {}", path));
            let stdout = self
                .listings
                .get(path)
                .map(|lines| lines.join("\n"))
                .unwrap_or_default();
            return Ok(CommandOutput {
                stdout,
                stderr: String::new(),
            });
        }
        if command.starts_with("test -e ") {
            let path = quoted_arg(command)
                .ok_or_else(|| SyncError::Dispatch(command.to_string()))?;
            let present = self.existing.lock().contains(path);
            return Ok(CommandOutput {
                stdout: if present { "yes\n".to_string() } else { String::new() },
                stderr: String::new(),
            });
        }
        if command.starts_with("rm ") {
            let path = quoted_arg(command)
                .ok_or_else(|| SyncError::Dispatch(command.to_string()))?;
            self.record(format!("rm {}", path));
            self.existing.lock().remove(path);
            return Ok(CommandOutput::default());
        }
        if command.starts_with("mkdir -p ") {
            let path = quoted_arg(command)
                .ok_or_else(|| SyncError::Dispatch(command.to_string()))?;
            self.record(format!("mkdir {}", path));
            return Ok(CommandOutput::default());
        }
        Err(SyncError::Dispatch(format!(
            "unscripted command: {}",
            command
        )))
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SyncError> {
        self.record(format!("get {}", remote_path));
        let contents = self
            .files
            .get(remote_path)
            .cloned()
            .unwrap_or_else(|| b"data".to_vec());
        std::fs::write(local_path, contents).map_err(|e| SyncError::Transfer {
            path: remote_path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), SyncError> {
        if !local_path.is_file() {
            return Err(SyncError::Transfer {
                path: remote_path.to_string(),
                reason: "local file missing".to_string(),
            });
        }
        self.record(format!("put {}", remote_path));
        self.existing.lock().insert(remote_path.to_string());
        Ok(())
    }
}
