//! SSH module - remote interactive shell sessions
//!
//! # Pieces
//! - `TransportSession`: connect with retry, send, resize, bounded disconnect
//! - Output relay: one task per session pumping remote output to a sink
//! - `Notifier`: every failure is reported as a `Notice`, never raised
//! - `RusshConnector`: password auth, PTY and shell over russh
//! - Trust-on-first-use host keys (`KnownHostsStore`)

mod client;
mod config;
mod error;
pub mod known_hosts;
mod notify;
mod relay;
mod retry;
mod session;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use client::{ClientHandler, RusshConnector, RusshShell};
pub use config::{Credential, SshConfig};
pub use error::{SessionFault, SshError};
pub use known_hosts::{HostKeyVerification, KnownHostsStore};
pub use notify::{ChannelNotifier, Notice, Notifier, Severity, TracingNotifier};
pub use relay::{OutputSink, SinkSlot, READ_TIMEOUT};
pub use retry::RetryPolicy;
pub use session::{SessionState, TransportSession, SHUTDOWN_TIMEOUT};
pub use transport::{ChannelEvent, Connector, ShellChannel};
