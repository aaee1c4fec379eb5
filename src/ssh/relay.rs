//! Output Relay
//!
//! One task per connected session. It is the only owner of the shell
//! channel: it pumps remote output to the installed sink and executes the
//! write/resize/close commands the session forwards to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{SessionFault, SshError};
use super::notify::{Notice, Notifier, Severity};
use super::transport::{ChannelEvent, ShellChannel};

/// Channel-level read timeout; expiry just means "no data yet"
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Receives decoded output chunks
pub type OutputSink = Arc<dyn Fn(String) + Send + Sync>;

/// Single-slot, last-writer-wins sink reference
#[derive(Clone, Default)]
pub struct SinkSlot {
    inner: Arc<RwLock<Option<OutputSink>>>,
}

impl SinkSlot {
    pub fn set(&self, sink: OutputSink) {
        *self.inner.write() = Some(sink);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Snapshot the current sink so it is called without holding the lock
    fn current(&self) -> Option<OutputSink> {
        self.inner.read().clone()
    }
}

/// Work the session hands to the relay
pub(crate) enum RelayCommand {
    Write {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<(), SshError>>,
    },
    Resize {
        cols: u32,
        rows: u32,
        reply: oneshot::Sender<Result<(), SshError>>,
    },
    Close,
}

/// Session-side view of a running relay
pub(crate) struct RelayHandle {
    pub cmd_tx: mpsc::Sender<RelayCommand>,
    pub stop: Arc<AtomicBool>,
    pub running: Arc<AtomicBool>,
    pub task: JoinHandle<()>,
}

enum RelayExit {
    Stopped,
    RemoteClosed,
    Failed(SshError),
}

/// Keeps a trailing partial UTF-8 sequence for the next read
#[derive(Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, bytes: &[u8]) -> Option<String> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);
        let end = complete_prefix_len(&buf);
        self.pending = buf.split_off(end);
        if buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&buf).into_owned())
        }
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Length of `buf` without a trailing, still incomplete multi-byte sequence
fn complete_prefix_len(buf: &[u8]) -> usize {
    let len = buf.len();
    let mut start = len;
    // A UTF-8 sequence is at most 4 bytes, so only the tail matters
    while start > 0 && len - start < 4 {
        start -= 1;
        let byte = buf[start];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if len - start >= needed { len } else { start };
    }
    len
}

pub(crate) fn spawn_relay(
    label: String,
    channel: Box<dyn ShellChannel>,
    sink: SinkSlot,
    notifier: Arc<dyn Notifier>,
) -> RelayHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<RelayCommand>(256);
    let stop = Arc::new(AtomicBool::new(false));
    let running = Arc::new(AtomicBool::new(true));

    let task = tokio::spawn(run_relay(
        label,
        channel,
        cmd_rx,
        sink,
        notifier,
        stop.clone(),
        running.clone(),
    ));

    RelayHandle {
        cmd_tx,
        stop,
        running,
        task,
    }
}

async fn run_relay(
    label: String,
    mut channel: Box<dyn ShellChannel>,
    mut cmd_rx: mpsc::Receiver<RelayCommand>,
    sink: SinkSlot,
    notifier: Arc<dyn Notifier>,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
) {
    debug!("Relay started for {}", label);
    let mut carry = Utf8Carry::default();

    let exit = loop {
        if stop.load(Ordering::SeqCst) {
            break RelayExit::Stopped;
        }

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(RelayCommand::Write { data, reply }) => {
                    let result = channel.write(&data).await;
                    if let Err(e) = &result {
                        warn!("Write to {} failed: {}", label, e);
                    }
                    let _ = reply.send(result);
                }
                Some(RelayCommand::Resize { cols, rows, reply }) => {
                    let result = channel.resize(cols, rows).await;
                    if result.is_ok() {
                        debug!("PTY for {} resized to {}x{}", label, cols, rows);
                    }
                    let _ = reply.send(result);
                }
                Some(RelayCommand::Close) | None => break RelayExit::Stopped,
            },

            event = tokio::time::timeout(READ_TIMEOUT, channel.next_event()) => match event {
                Err(_elapsed) => continue,
                Ok(Ok(ChannelEvent::Data(bytes))) => {
                    if let Some(text) = carry.decode(&bytes) {
                        deliver(&sink, text);
                    }
                    tokio::task::yield_now().await;
                }
                Ok(Ok(ChannelEvent::Closed)) => break RelayExit::RemoteClosed,
                Ok(Err(e)) => break RelayExit::Failed(e),
            },
        }
    };

    if let Some(rest) = carry.finish() {
        deliver(&sink, rest);
    }

    // Stop accepting commands; senders waiting on a reply get `Disconnected`
    cmd_rx.close();
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            RelayCommand::Write { reply, .. } | RelayCommand::Resize { reply, .. } => {
                let _ = reply.send(Err(SshError::Disconnected));
            }
            RelayCommand::Close => {}
        }
    }

    channel.close().await;

    match exit {
        RelayExit::Stopped => debug!("Relay for {} stopped", label),
        RelayExit::RemoteClosed => {
            info!("Remote side closed {}", label);
            notifier.notify(Notice::new(
                Severity::Information,
                format!("Connection to {} closed by remote host", label),
            ));
        }
        RelayExit::Failed(e) => {
            warn!("Relay for {} ended with error: {}", label, e);
            notifier.notify(Notice::fault(
                Severity::Error,
                SessionFault::NetworkError,
                format!("Lost connection to {}: {}", label, e),
            ));
        }
    }

    running.store(false, Ordering::SeqCst);
}

fn deliver(sink: &SinkSlot, text: String) {
    match sink.current() {
        Some(sink) => sink(text),
        None => debug!("Dropping {} bytes of output, no sink installed", text.len()),
    }
}
