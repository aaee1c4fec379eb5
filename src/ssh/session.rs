//! Transport Session
//!
//! Owns one remote shell: connect with retry, a background relay for output,
//! writes and resizes routed through the relay, and bounded-time teardown.
//!
//! ```text
//! Uninitialized -> Connecting -> Connected -> Disconnecting -> Disconnected
//!                    ^    |                                        |
//!                    +----+ (retry)                                |
//!                    +---------------------------------------------+ (reconnect)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::config::SshConfig;
use super::error::{SessionFault, SshError};
use super::notify::{Notice, Notifier, Severity};
use super::relay::{spawn_relay, RelayCommand, RelayHandle, SinkSlot};
use super::retry::RetryPolicy;
use super::transport::Connector;

/// How long `disconnect` waits for the relay task before giving up on it
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(1500);

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
    Disconnected = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            4 => Self::Disconnected,
            _ => Self::Uninitialized,
        }
    }
}

pub struct TransportSession {
    config: parking_lot::Mutex<SshConfig>,
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn Notifier>,
    state: AtomicU8,
    sink: SinkSlot,
    relay: parking_lot::Mutex<Option<RelayHandle>>,
    /// Serializes connect and disconnect
    lifecycle: tokio::sync::Mutex<()>,
    shutdown_timeout: Duration,
}

impl TransportSession {
    pub fn new(config: SshConfig, connector: Arc<dyn Connector>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config: parking_lot::Mutex::new(config),
            connector,
            notifier,
            state: AtomicU8::new(SessionState::Uninitialized as u8),
            sink: SinkSlot::default(),
            relay: parking_lot::Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// False once the relay has exited, even if nobody called `disconnect`
    pub fn is_relay_running(&self) -> bool {
        self.relay
            .lock()
            .as_ref()
            .map(|r| r.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub fn config(&self) -> SshConfig {
        self.config.lock().clone()
    }

    pub fn target(&self) -> String {
        self.config.lock().target()
    }

    /// Install or replace the output sink; the relay keeps running
    pub fn set_output_sink<F>(&self, sink: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.sink.set(Arc::new(sink));
    }

    pub fn clear_output_sink(&self) {
        self.sink.clear();
    }

    /// Try up to `policy.attempts()` times to bring up a shell
    ///
    /// Authentication failures and rejected host keys end the loop at once.
    pub async fn connect(&self, policy: &RetryPolicy) -> bool {
        let _guard = self.lifecycle.lock().await;

        if self.relay.lock().is_some() {
            info!("Reconnecting {}, releasing previous channel", self.target());
            self.teardown().await;
        }

        let config = self.config();
        let target = config.target();

        if let Err(e) = config.validate() {
            self.report_connect_failure(&target, 1, 1, &e);
            self.set_state(SessionState::Disconnected);
            return false;
        }

        let attempts = policy.attempts();
        for attempt in 0..attempts {
            self.set_state(SessionState::Connecting);
            debug!("Connect attempt {}/{} to {}", attempt + 1, attempts, target);

            match self.connector.open_shell(&config).await {
                Ok(channel) => {
                    let relay =
                        spawn_relay(target.clone(), channel, self.sink.clone(), self.notifier.clone());
                    *self.relay.lock() = Some(relay);
                    self.set_state(SessionState::Connected);

                    info!("Connected to {}", target);
                    self.notifier
                        .notify(Notice::success(format!("Connected to {}", target)));
                    return true;
                }
                Err(e) => {
                    self.report_connect_failure(&target, attempt + 1, attempts, &e);
                    if !e.is_retryable() {
                        break;
                    }
                    if attempt + 1 < attempts {
                        tokio::time::sleep(policy.backoff(attempt)).await;
                    }
                }
            }
        }

        self.set_state(SessionState::Disconnected);
        false
    }

    fn report_connect_failure(&self, target: &str, attempt: u32, attempts: u32, err: &SshError) {
        warn!(
            "Connect attempt {}/{} to {} failed: {}",
            attempt, attempts, target, err
        );
        self.notifier.notify(Notice::fault(
            Severity::Error,
            err.fault(),
            format!(
                "Connection attempt {}/{} to {} failed: {}",
                attempt, attempts, target, err
            ),
        ));
    }

    fn command_sender(&self) -> Option<mpsc::Sender<RelayCommand>> {
        if !self.is_connected() {
            return None;
        }
        self.relay.lock().as_ref().map(|r| r.cmd_tx.clone())
    }

    /// Write raw text to the remote shell. Failures become notices.
    pub async fn send(&self, text: &str) {
        let Some(cmd_tx) = self.command_sender() else {
            self.notifier.notify(Notice::fault(
                Severity::Error,
                SessionFault::SendFailed,
                "Not connected to SSH server",
            ));
            return;
        };

        let (reply, reply_rx) = oneshot::channel();
        let outcome = match cmd_tx
            .send(RelayCommand::Write {
                data: text.as_bytes().to_vec(),
                reply,
            })
            .await
        {
            Ok(()) => reply_rx.await.unwrap_or(Err(SshError::Disconnected)),
            Err(_) => Err(SshError::Disconnected),
        };

        if let Err(e) = outcome {
            self.notifier.notify(Notice::fault(
                Severity::Error,
                SessionFault::SendFailed,
                format!("Failed to send to {}: {}", self.target(), e),
            ));
        }
    }

    /// Change the remote PTY size. Ignored while disconnected; the new size
    /// still applies to the next connect.
    pub async fn resize(&self, cols: u32, rows: u32) {
        {
            let mut config = self.config.lock();
            config.cols = cols;
            config.rows = rows;
        }

        let Some(cmd_tx) = self.command_sender() else {
            debug!("Resize to {}x{} deferred, not connected", cols, rows);
            return;
        };

        let (reply, reply_rx) = oneshot::channel();
        let outcome = match cmd_tx
            .send(RelayCommand::Resize { cols, rows, reply })
            .await
        {
            Ok(()) => reply_rx.await.unwrap_or(Err(SshError::Disconnected)),
            Err(_) => Err(SshError::Disconnected),
        };

        if let Err(e) = outcome {
            self.notifier.notify(Notice::fault(
                Severity::Warning,
                e.fault(),
                format!("Failed to resize terminal to {}x{}: {}", cols, rows, e),
            ));
        }
    }

    /// Stop the relay and release channel and connection. Idempotent.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        self.teardown().await;
    }

    async fn teardown(&self) {
        let Some(relay) = self.relay.lock().take() else {
            return;
        };
        self.set_state(SessionState::Disconnecting);
        let target = self.target();

        relay.stop.store(true, Ordering::SeqCst);
        // Full queue is fine, the stop flag is checked every read timeout
        let _ = relay.cmd_tx.try_send(RelayCommand::Close);
        drop(relay.cmd_tx);

        let mut task = relay.task;
        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => debug!("Relay for {} joined", target),
            Ok(Err(e)) => warn!("Relay for {} ended abnormally: {}", target, e),
            Err(_) => {
                task.abort();
                warn!(
                    "Relay for {} did not stop within {:?}, aborted",
                    target, self.shutdown_timeout
                );
                self.notifier.notify(Notice::fault(
                    Severity::Warning,
                    SessionFault::ShutdownTimeout,
                    format!("Session {} did not shut down cleanly", target),
                ));
            }
        }

        self.set_state(SessionState::Disconnected);
        info!("Disconnected from {}", target);
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        // Best effort; the relay closes the channel once it sees the flag
        if let Some(relay) = self.relay.get_mut().take() {
            debug!("Dropping connected session {}", self.config.get_mut().target());
            relay.stop.store(true, Ordering::SeqCst);
            let _ = relay.cmd_tx.try_send(RelayCommand::Close);
        }
    }
}
