//! SSH Client implementation using russh

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg, Disconnect};
use tracing::{debug, info, warn};

use super::config::SshConfig;
use super::error::SshError;
use super::known_hosts::{HostKeyVerification, KnownHostsStore};
use super::transport::{ChannelEvent, Connector, ShellChannel};

const TERM: &str = "xterm-256color";

/// Dials real SSH servers
pub struct RusshConnector {
    known_hosts: Arc<KnownHostsStore>,
    /// Reject hosts we have never seen instead of remembering them
    strict_host_key_checking: bool,
}

impl RusshConnector {
    pub fn new(known_hosts: Arc<KnownHostsStore>) -> Self {
        Self {
            known_hosts,
            strict_host_key_checking: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_host_key_checking = strict;
        self
    }

    async fn resolve(config: &SshConfig) -> Result<SocketAddr, SshError> {
        let target = (config.host.as_str(), config.port);
        let mut addrs = tokio::time::timeout(config.timeout(), tokio::net::lookup_host(target))
            .await
            .map_err(|_| SshError::Timeout(format!("resolving {} timed out", config.host)))?
            .map_err(|e| SshError::HostUnknown(format!("{}: {}", config.host, e)))?;
        addrs
            .next()
            .ok_or_else(|| SshError::HostUnknown(format!("{}: no address found", config.host)))
    }

    async fn establish(&self, config: &SshConfig, addr: SocketAddr) -> Result<RusshShell, SshError> {
        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(
            config.host.clone(),
            config.port,
            self.known_hosts.clone(),
            self.strict_host_key_checking,
        );

        let mut handle = client::connect(Arc::new(ssh_config), addr, handler).await?;
        debug!("SSH handshake completed with {}", addr);

        let auth = handle
            .authenticate_password(config.username.clone(), config.credential.expose())
            .await?;
        if !auth.success() {
            return Err(SshError::AuthenticationFailed(format!(
                "server rejected password for {}",
                config.username
            )));
        }
        info!("SSH authentication successful for {}", config.target());

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::ChannelError(format!("open session failed: {}", e)))?;

        channel
            .request_pty(false, TERM, config.cols, config.rows, 0, 0, &[])
            .await
            .map_err(|e| SshError::ChannelError(format!("PTY request failed: {}", e)))?;

        channel
            .request_shell(false)
            .await
            .map_err(|e| SshError::ChannelError(format!("Shell request failed: {}", e)))?;

        debug!("PTY {}x{} and shell ready", config.cols, config.rows);
        Ok(RusshShell { handle, channel })
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn open_shell(&self, config: &SshConfig) -> Result<Box<dyn ShellChannel>, SshError> {
        config.validate()?;

        info!("Connecting to SSH server at {}", config.target());
        let addr = Self::resolve(config).await?;

        let shell = tokio::time::timeout(config.timeout(), self.establish(config, addr))
            .await
            .map_err(|_| {
                SshError::Timeout(format!(
                    "no shell from {} within {}s",
                    config.target(),
                    config.timeout_secs
                ))
            })??;

        Ok(Box::new(shell))
    }
}

/// Live russh connection plus its shell channel
pub struct RusshShell {
    handle: Handle<ClientHandler>,
    channel: Channel<Msg>,
}

#[async_trait]
impl ShellChannel for RusshShell {
    async fn next_event(&mut self) -> Result<ChannelEvent, SshError> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    return Ok(ChannelEvent::Data(Bytes::copy_from_slice(&data[..])));
                }
                // stderr shares the terminal with stdout
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                    return Ok(ChannelEvent::Data(Bytes::copy_from_slice(&data[..])));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Ok(ChannelEvent::Closed);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("Remote shell exited with status {}", exit_status);
                }
                Some(_) => {}
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SshError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SshError::SendFailed(e.to_string()))
    }

    async fn resize(&mut self, cols: u32, rows: u32) -> Result<(), SshError> {
        self.channel
            .window_change(cols, rows, 0, 0)
            .await
            .map_err(|e| SshError::ChannelError(format!("window change failed: {}", e)))
    }

    async fn close(&mut self) {
        let _ = self.channel.eof().await;
        let _ = self.channel.close().await;
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "Session closed", "en")
            .await
        {
            debug!("SSH disconnect returned: {}", e);
        }
    }
}

/// Client handler for russh callbacks (host key verification)
pub struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: Arc<KnownHostsStore>,
    strict: bool,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, known_hosts: Arc<KnownHostsStore>, strict: bool) -> Self {
        Self {
            host,
            port,
            known_hosts,
            strict,
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self
            .known_hosts
            .verify(&self.host, self.port, server_public_key)
        {
            HostKeyVerification::Verified => {
                debug!("Host key verified for {}:{}", self.host, self.port);
                Ok(true)
            }
            HostKeyVerification::Unknown { fingerprint } if self.strict => {
                warn!(
                    "Unknown host key for {}:{} ({}), strict mode rejects it",
                    self.host, self.port, fingerprint
                );
                Err(SshError::HostKeyRejected(format!(
                    "unknown host {}:{} (fingerprint {})",
                    self.host, self.port, fingerprint
                )))
            }
            HostKeyVerification::Unknown { fingerprint } => {
                info!(
                    "New host {}:{}, remembering key {}",
                    self.host, self.port, fingerprint
                );
                if let Err(e) = self
                    .known_hosts
                    .add_host(&self.host, self.port, server_public_key)
                {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(true)
            }
            HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint,
            } => {
                warn!(
                    "HOST KEY CHANGED for {}:{}! Expected {}, got {}",
                    self.host, self.port, expected_fingerprint, actual_fingerprint
                );
                Err(SshError::HostKeyRejected(format!(
                    "key for {}:{} changed (expected {}, got {})",
                    self.host, self.port, expected_fingerprint, actual_fingerprint
                )))
            }
        }
    }
}
