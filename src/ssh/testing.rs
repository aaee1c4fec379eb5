//! Scripted transport for exercising sessions without a network

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::config::SshConfig;
use super::error::{SessionFault, SshError};
use super::notify::{Notice, Notifier};
use super::transport::{ChannelEvent, Connector, ShellChannel};

type ErrorFactory = Box<dyn Fn() -> SshError + Send + Sync>;

/// Connector whose attempts follow a script, then fall back to a default
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Option<ErrorFactory>>>,
    fallback: Option<ErrorFactory>,
    attempts: AtomicUsize,
    probes: Mutex<Vec<ShellProbe>>,
    hang_on_close: bool,
}

impl ScriptedConnector {
    pub fn succeeding() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            attempts: AtomicUsize::new(0),
            probes: Mutex::new(Vec::new()),
            hang_on_close: false,
        }
    }

    pub fn failing_with<F>(make: F) -> Self
    where
        F: Fn() -> SshError + Send + Sync + 'static,
    {
        Self {
            fallback: Some(Box::new(make)),
            ..Self::succeeding()
        }
    }

    /// Fail the next `n` attempts with `make`, then behave as before
    pub fn fail_first<F>(self, n: usize, make: F) -> Self
    where
        F: Fn() -> SshError + Send + Sync + Clone + 'static,
    {
        {
            let mut script = self.script.lock();
            for _ in 0..n {
                script.push_back(Some(Box::new(make.clone())));
            }
        }
        self
    }

    /// Let the next `n` attempts through, then behave as before
    pub fn succeed_first(self, n: usize) -> Self {
        {
            let mut script = self.script.lock();
            for _ in 0..n {
                script.push_back(None);
            }
        }
        self
    }

    pub fn hang_on_close(mut self) -> Self {
        self.hang_on_close = true;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Handle to the `index`th shell handed out
    pub fn probe(&self, index: usize) -> ShellProbe {
        self.probes.lock()[index].clone()
    }

    pub fn opened(&self) -> usize {
        self.probes.lock().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open_shell(&self, config: &SshConfig) -> Result<Box<dyn ShellChannel>, SshError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let scripted = self.script.lock().pop_front();
        let failure = match scripted {
            Some(Some(make)) => Some(make()),
            Some(None) => None,
            None => self.fallback.as_ref().map(|make| make()),
        };
        if let Some(e) = failure {
            return Err(e);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let probe = ShellProbe {
            incoming: tx,
            writes: Arc::new(Mutex::new(Vec::new())),
            resizes: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            initial_size: (config.cols, config.rows),
        };
        let shell = ScriptedShell {
            incoming: rx,
            probe: probe.clone(),
            hang_on_close: self.hang_on_close,
        };
        self.probes.lock().push(probe);
        Ok(Box::new(shell))
    }
}

/// Test-side view of a scripted shell
#[derive(Clone)]
pub struct ShellProbe {
    incoming: mpsc::UnboundedSender<Result<ChannelEvent, SshError>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    resizes: Arc<Mutex<Vec<(u32, u32)>>>,
    closes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
    initial_size: (u32, u32),
}

impl ShellProbe {
    pub fn push_output(&self, text: &str) {
        let _ = self
            .incoming
            .send(Ok(ChannelEvent::Data(Bytes::copy_from_slice(text.as_bytes()))));
    }

    pub fn close_remote(&self) {
        let _ = self.incoming.send(Ok(ChannelEvent::Closed));
    }

    pub fn fail_read(&self, err: SshError) {
        let _ = self.incoming.send(Err(err));
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn resizes(&self) -> Vec<(u32, u32)> {
        self.resizes.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn initial_size(&self) -> (u32, u32) {
        self.initial_size
    }
}

struct ScriptedShell {
    incoming: mpsc::UnboundedReceiver<Result<ChannelEvent, SshError>>,
    probe: ShellProbe,
    hang_on_close: bool,
}

#[async_trait]
impl ShellChannel for ScriptedShell {
    async fn next_event(&mut self) -> Result<ChannelEvent, SshError> {
        match self.incoming.recv().await {
            Some(event) => event,
            None => Ok(ChannelEvent::Closed),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SshError> {
        if self.probe.fail_writes.load(Ordering::SeqCst) {
            return Err(SshError::SendFailed("channel write refused".into()));
        }
        self.probe.writes.lock().push(data.to_vec());
        Ok(())
    }

    async fn resize(&mut self, cols: u32, rows: u32) -> Result<(), SshError> {
        self.probe.resizes.lock().push((cols, rows));
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
    }
}

/// Keeps every notice for later assertions
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn count(&self, fault: SessionFault) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.fault == Some(fault))
            .count()
    }

    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
