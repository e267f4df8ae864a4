//! Remote Session
//!
//! Owns one authenticated SSH connection to the tablet and exposes command
//! execution plus a transfer-channel factory. Lifecycle transitions reach the
//! caller through `SessionEvents`; beyond that the only state a caller may
//! poll is the `connected()` snapshot. No retries happen at this layer.

pub mod transport;

use crate::error::SyncError;
use async_trait::async_trait;
use russh::client;
use russh::ChannelMsg;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub use transport::{CommandOutput, RemoteTransport};

/// Lifecycle callbacks. These three calls are the complete external contract;
/// each handle fires `connected` or `connection_failed` exactly once, and
/// `disconnected` at most once afterwards.
pub trait SessionEvents: Send + Sync {
    fn connected(&self) {}
    fn connection_failed(&self, _reason: &str) {}
    fn disconnected(&self) {}
}

/// For callers that only poll `connected()`.
pub struct NullEvents;

impl SessionEvents for NullEvents {}

/// Session lifecycle state. `Failed` and a graceful `Disconnected` are both
/// terminal for a handle; reconnecting always produces a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // The tablet regenerates its host key on factory reset, so the key is
        // accepted without pinning. Same trust model as the USB web interface.
        Ok(true)
    }
}

/// One authenticated connection to the device.
pub struct DeviceSession {
    handle: Arc<client::Handle<ClientHandler>>,
    connected: Arc<AtomicBool>,
    state: Arc<parking_lot::Mutex<SessionState>>,
    events: Arc<dyn SessionEvents>,
}

impl DeviceSession {
    /// Establish and authenticate a session.
    ///
    /// Fires `connected` on success or `connection_failed` with the cause,
    /// and spawns a monitor that fires `disconnected` when the underlying
    /// connection later drops.
    pub async fn connect(
        host: &str,
        username: &str,
        password: &str,
        events: Arc<dyn SessionEvents>,
    ) -> Result<Self, SyncError> {
        let state = Arc::new(parking_lot::Mutex::new(SessionState::Connecting));
        let addr = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:22", host)
        };
        info!("connecting to device at {}", addr);

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            ..Default::default()
        });

        let mut handle = match client::connect(config, addr.as_str(), ClientHandler).await {
            Ok(handle) => handle,
            Err(e) => {
                *state.lock() = SessionState::Failed;
                events.connection_failed(&e.to_string());
                return Err(SyncError::Connection(e.to_string()));
            }
        };

        let authenticated = match handle.authenticate_password(username, password).await {
            Ok(ok) => ok,
            Err(e) => {
                *state.lock() = SessionState::Failed;
                events.connection_failed(&e.to_string());
                return Err(SyncError::Connection(e.to_string()));
            }
        };
        if !authenticated {
            *state.lock() = SessionState::Failed;
            events.connection_failed("authentication rejected");
            return Err(SyncError::Connection(
                "authentication rejected by device".to_string(),
            ));
        }

        *state.lock() = SessionState::Connected;
        let connected = Arc::new(AtomicBool::new(true));
        events.connected();
        info!("session established as {}", username);

        let session = Self {
            handle: Arc::new(handle),
            connected: connected.clone(),
            state: state.clone(),
            events: events.clone(),
        };
        spawn_monitor(
            Arc::downgrade(&session.handle),
            session.connected.clone(),
            session.state.clone(),
            session.events.clone(),
        );
        Ok(session)
    }

    /// Connection snapshot. The event callbacks carry the transitions.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Execute a command on the device, concatenating incremental output
    /// until the channel closes.
    pub async fn execute(&self, command: &str) -> Result<CommandOutput, SyncError> {
        if !self.connected() {
            return Err(SyncError::Dispatch("session is not connected".to_string()));
        }
        debug!("executing command: {}", command);

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SyncError::Dispatch(e.to_string()))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| SyncError::Dispatch(e.to_string()))?;

        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        loop {
            let Some(msg) = channel.wait().await else {
                break;
            };
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => {
                    debug!("command exited with status {}", exit_status);
                }
                _ => {}
            }
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    /// Open a bulk transfer channel over this session.
    ///
    /// Each channel supports one file operation at a time; callers wanting
    /// concurrency must queue rather than share a channel.
    pub async fn open_transfer_channel(&self) -> Result<SftpSession, SyncError> {
        if !self.connected() {
            return Err(SyncError::Channel("session is not connected".to_string()));
        }
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SyncError::Channel(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| SyncError::Channel(format!("sftp subsystem refused: {}", e)))?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SyncError::Channel(e.to_string()))
    }

    /// Gracefully end the session.
    pub async fn close(&self) -> Result<(), SyncError> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| SyncError::Connection(e.to_string()))?;
        self.connected.store(false, Ordering::SeqCst);
        *self.state.lock() = SessionState::Disconnected;
        Ok(())
    }

}

/// What the monitor needs from a connection handle.
trait ClosedProbe: Send + Sync {
    fn is_closed(&self) -> bool;
}

impl ClosedProbe for client::Handle<ClientHandler> {
    fn is_closed(&self) -> bool {
        client::Handle::is_closed(self)
    }
}

// russh gives no close notification on the handle, so poll it. Half a
// second of latency on the disconnected callback is fine for a UI banner.
// The task holds the handle weakly; when the last session clone is dropped
// without close(), the task ends instead of keeping the connection alive.
fn spawn_monitor<P: ClosedProbe + 'static>(
    handle: Weak<P>,
    connected: Arc<AtomicBool>,
    state: Arc<parking_lot::Mutex<SessionState>>,
    events: Arc<dyn SessionEvents>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if !connected.load(Ordering::SeqCst) {
                // close() already ran; state is Disconnected.
                break;
            }
            let Some(handle) = handle.upgrade() else {
                debug!("session handle dropped, monitor ending");
                break;
            };
            if handle.is_closed() {
                warn!("device session dropped");
                connected.store(false, Ordering::SeqCst);
                *state.lock() = SessionState::Disconnected;
                events.disconnected();
                break;
            }
        }
    })
}

#[async_trait]
impl RemoteTransport for DeviceSession {
    async fn execute(&self, command: &str) -> Result<CommandOutput, SyncError> {
        DeviceSession::execute(self, command).await
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SyncError> {
        let sftp = self.open_transfer_channel().await?;
        let mut remote = sftp.open(remote_path).await.map_err(|e| SyncError::Transfer {
            path: remote_path.to_string(),
            reason: e.to_string(),
        })?;
        let mut local = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| SyncError::Transfer {
                path: local_path.display().to_string(),
                reason: e.to_string(),
            })?;
        tokio::io::copy(&mut remote, &mut local)
            .await
            .map_err(|e| SyncError::Transfer {
                path: remote_path.to_string(),
                reason: e.to_string(),
            })?;
        local.flush().await?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), SyncError> {
        let sftp = self.open_transfer_channel().await?;
        let mut local = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| SyncError::Transfer {
                path: local_path.display().to_string(),
                reason: e.to_string(),
            })?;
        let mut remote = sftp
            .open_with_flags(
                remote_path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| SyncError::Transfer {
                path: remote_path.to_string(),
                reason: e.to_string(),
            })?;
        tokio::io::copy(&mut local, &mut remote)
            .await
            .map_err(|e| SyncError::Transfer {
                path: remote_path.to_string(),
                reason: e.to_string(),
            })?;
        remote.flush().await.map_err(|e| SyncError::Transfer {
            path: remote_path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}
