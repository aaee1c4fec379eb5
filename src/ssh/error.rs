//! SSH Error types
//!
//! `SshError` carries the structured cause of a failure. `SessionFault` is the
//! coarse taxonomy reported to the control surface through the notifier.

use std::fmt;
use std::io;

use thiserror::Error;

/// Failure categories surfaced to the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionFault {
    /// Wrong credentials; retrying cannot help
    AuthenticationFailed,
    /// Network unreachable or slow
    ConnectionTimeout,
    /// Generic transport-level failure
    NetworkError,
    /// Name resolution or host verification failure
    HostUnknown,
    /// Write to an active channel failed
    SendFailed,
    /// Relay task did not exit inside the join window
    ShutdownTimeout,
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionFault::AuthenticationFailed => "AuthenticationFailed",
            SessionFault::ConnectionTimeout => "ConnectionTimeout",
            SessionFault::NetworkError => "NetworkError",
            SessionFault::HostUnknown => "HostUnknown",
            SessionFault::SendFailed => "SendFailed",
            SessionFault::ShutdownTimeout => "ShutdownTimeout",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Unknown host: {0}")]
    HostUnknown(String),

    #[error("Host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Disconnected")]
    Disconnected,
}

impl SshError {
    /// Map the structured error onto the reporting taxonomy
    pub fn fault(&self) -> SessionFault {
        match self {
            SshError::AuthenticationFailed(_) => SessionFault::AuthenticationFailed,
            SshError::Timeout(_) => SessionFault::ConnectionTimeout,
            SshError::HostUnknown(_) | SshError::HostKeyRejected(_) => SessionFault::HostUnknown,
            SshError::SendFailed(_) | SshError::NotConnected => SessionFault::SendFailed,
            SshError::IoError(e) if is_timeout_kind(e.kind()) => SessionFault::ConnectionTimeout,
            SshError::ProtocolError(msg) if mentions_timeout(msg) => {
                SessionFault::ConnectionTimeout
            }
            SshError::ConnectionFailed(_)
            | SshError::InvalidTarget(_)
            | SshError::ChannelError(_)
            | SshError::IoError(_)
            | SshError::ProtocolError(_)
            | SshError::Disconnected => SessionFault::NetworkError,
        }
    }

    /// Whether another connect attempt could succeed
    ///
    /// Credentials, rejected host keys and malformed targets stay wrong no
    /// matter how long we back off.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SshError::AuthenticationFailed(_)
                | SshError::HostKeyRejected(_)
                | SshError::InvalidTarget(_)
        )
    }
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::IO(e) => SshError::IoError(e),
            russh::Error::ConnectionTimeout => {
                SshError::Timeout("SSH handshake timed out".to_string())
            }
            russh::Error::Disconnect => SshError::Disconnected,
            russh::Error::UnknownKey => {
                SshError::HostKeyRejected("server host key was not accepted".to_string())
            }
            other => SshError::ProtocolError(other.to_string()),
        }
    }
}

fn is_timeout_kind(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

/// Last resort for errors that only carry a message
fn mentions_timeout(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("timed out") || lower.contains("timeout")
}
