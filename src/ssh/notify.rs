//! Notification path out of the session core
//!
//! Every failure inside connect, send, resize and the relay loop ends up here
//! as a `Notice`. Nothing is thrown back at the control surface.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::error::SessionFault;

/// Notice severity, mirrors what the control surface can display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Success,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "information",
            Severity::Success => "success",
        };
        f.write_str(label)
    }
}

/// One report from the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    /// Taxonomy entry when the notice reports a failure
    pub fault: Option<SessionFault>,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            fault: None,
        }
    }

    pub fn fault(severity: Severity, fault: SessionFault, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            fault: Some(fault),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Information, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }
}

/// Receiver of core notices
///
/// Implementations may be called from any runtime worker.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<F> Notifier for F
where
    F: Fn(Notice) + Send + Sync,
{
    fn notify(&self, notice: Notice) {
        self(notice)
    }
}

/// Forwards notices into a queue drained by the UI loop
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        // Receiver gone means the UI is shutting down
        let _ = self.tx.send(notice);
    }
}

/// Writes notices to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => error!(fault = ?notice.fault, "{}", notice.message),
            Severity::Warning => warn!(fault = ?notice.fault, "{}", notice.message),
            Severity::Information | Severity::Success => info!("{}", notice.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_notifier() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = move |n: Notice| sink.lock().push(n);

        notifier.notify(Notice::warning("careful"));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].severity, Severity::Warning);
        assert_eq!(seen[0].fault, None);
    }

    #[tokio::test]
    async fn test_channel_notifier_marshals() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notice::fault(
            Severity::Error,
            SessionFault::SendFailed,
            "broken pipe",
        ));
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.fault, Some(SessionFault::SendFailed));
        assert_eq!(notice.message, "broken pipe");
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Notice::info("nobody listening"));
    }
}
