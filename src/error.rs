//! Error taxonomy for the sync engine.
//!
//! One library-wide enum covering session, transfer, and local-scan failures.
//! Retry policy lives with the caller; nothing in here retries on its own.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the session, device operations, and mirror scans.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The session could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// A remote command could not be dispatched on an otherwise live session.
    #[error("command dispatch failed: {0}")]
    Dispatch(String),

    /// A transfer channel could not be opened or used.
    #[error("transfer channel error: {0}")]
    Channel(String),

    /// A single file move failed in either direction.
    #[error("transfer failed for {path}: {reason}")]
    Transfer { path: String, reason: String },

    /// A local metadata record could not be parsed. Fatal to the whole scan.
    #[error("malformed metadata record {hash}: {source}")]
    Parse {
        hash: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record declared a type that is neither a directory nor a document.
    #[error("unrecognized object type {kind:?} in record {hash}")]
    UnknownType { hash: String, kind: String },

    /// An expected local mirror directory or catalog file is absent.
    /// Non-fatal for scans: the affected category yields an empty result.
    #[error("local path not found: {0}")]
    NotFound(PathBuf),

    /// The tree does not contain the referenced node.
    #[error("unknown node {0}")]
    UnknownNode(String),

    /// A long-running operation is already holding the mutation token.
    #[error("another sync operation is in progress")]
    OperationInProgress,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Single human-readable message for surfacing to the user.
    ///
    /// Each failed operation surfaces exactly one of these per attempt.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Connection(_) => {
                "Could not connect to the tablet. Check the address and that the device is awake."
                    .to_string()
            }
            SyncError::Dispatch(_) => {
                "The tablet did not accept the command. Try reconnecting.".to_string()
            }
            SyncError::Channel(_) => {
                "Could not open a file transfer channel to the tablet.".to_string()
            }
            SyncError::Transfer { path, .. } => {
                format!("Transfer failed for {}.", path)
            }
            SyncError::Parse { hash, .. } => {
                format!("Local file data for {} is corrupted. Re-sync from the device.", hash)
            }
            SyncError::UnknownType { hash, .. } => {
                format!("Local file data for {} has an unrecognized type.", hash)
            }
            SyncError::NotFound(path) => {
                format!("Expected local directory {} does not exist.", path.display())
            }
            SyncError::UnknownNode(hash) => format!("No document or directory {} is known.", hash),
            SyncError::OperationInProgress => {
                "Another sync operation is still running. Wait for it to finish.".to_string()
            }
            SyncError::Io(e) => format!("Local disk error: {}.", e),
            SyncError::Config(msg) => format!("Configuration problem: {}.", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_names_the_failed_path() {
        let err = SyncError::Transfer {
            path: "/usr/share/remarkable/suspended.png".to_string(),
            reason: "sftp closed".to_string(),
        };
        assert!(err.user_message().contains("suspended.png"));
    }

    #[test]
    fn parse_error_names_offending_hash() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SyncError::Parse {
            hash: "abc123".to_string(),
            source,
        };
        assert!(err.to_string().contains("abc123"));
        assert!(err.user_message().contains("abc123"));
    }
}
