//! Transport seam between the session state machine and the wire
//!
//! `Connector` dials, authenticates and opens a PTY shell. The returned
//! `ShellChannel` is moved into the relay task, which becomes its only owner.

use async_trait::async_trait;
use bytes::Bytes;

use super::config::SshConfig;
use super::error::SshError;

/// What the remote side sent us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Shell output (stdout and stderr are merged)
    Data(Bytes),
    /// Remote sent EOF or closed the channel
    Closed,
}

/// An authenticated interactive shell with its connection handle
#[async_trait]
pub trait ShellChannel: Send {
    /// Wait for the next event. Must be cancel safe: the relay polls it
    /// under a timeout.
    async fn next_event(&mut self) -> Result<ChannelEvent, SshError>;

    /// Write raw bytes to the remote shell
    async fn write(&mut self, data: &[u8]) -> Result<(), SshError>;

    /// Change the remote PTY dimensions
    async fn resize(&mut self, cols: u32, rows: u32) -> Result<(), SshError>;

    /// Close the channel, then the connection handle
    async fn close(&mut self);
}

/// Factory for shell channels
#[async_trait]
pub trait Connector: Send + Sync {
    /// One attempt: connect, authenticate, request PTY and shell
    async fn open_shell(&self, config: &SshConfig) -> Result<Box<dyn ShellChannel>, SshError>;
}
