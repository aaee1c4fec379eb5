//! Session Registry
//!
//! Maps caller-chosen ids to live `TransportSession`s. DashMap for lookups,
//! a per-id async lock so create and disconnect on one id never interleave.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::ssh::{Connector, Notifier, OutputSink, RetryPolicy, SshConfig, TransportSession};

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<TransportSession>>,
    /// Per-id lifecycle locks; an entry lives while its id has a session
    id_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn Notifier>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            sessions: DashMap::new(),
            id_locks: DashMap::new(),
            connector,
            notifier,
        }
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.id_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Build a session for `id` and connect it, replacing any existing one
    ///
    /// The previous session under `id` is disconnected before the new one
    /// dials. The new session is stored only when connect succeeds; on
    /// failure nothing is left under `id`.
    pub async fn create_connection(&self, id: &str, config: SshConfig, policy: &RetryPolicy) -> bool {
        self.establish(id, config, policy, None).await
    }

    /// Like `create_connection`, with `sink` installed before the first byte
    /// can arrive so the login banner is not lost
    pub async fn create_connection_with_sink(
        &self,
        id: &str,
        config: SshConfig,
        policy: &RetryPolicy,
        sink: OutputSink,
    ) -> bool {
        self.establish(id, config, policy, Some(sink)).await
    }

    async fn establish(
        &self,
        id: &str,
        config: SshConfig,
        policy: &RetryPolicy,
        sink: Option<OutputSink>,
    ) -> bool {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let previous = self.sessions.remove(id).map(|(_, session)| session);
        if let Some(previous) = previous {
            info!("Replacing session {} ({})", id, previous.target());
            previous.disconnect().await;
        }

        let session = Arc::new(TransportSession::new(
            config,
            self.connector.clone(),
            self.notifier.clone(),
        ));
        if let Some(sink) = sink {
            session.set_output_sink(move |chunk| sink(chunk));
        }

        let connected = session.connect(policy).await;
        debug!("Session {} connect finished: {}", id, connected);
        if connected {
            self.sessions.insert(id.to_string(), session);
        } else {
            self.release_lock(id, &lock);
        }
        connected
    }

    pub fn get_connection(&self, id: &str) -> Option<Arc<TransportSession>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Disconnect and forget `id`; unknown ids are ignored
    pub async fn disconnect_session(&self, id: &str) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let removed = self.sessions.remove(id).map(|(_, session)| session);
        match removed {
            Some(session) => {
                session.disconnect().await;
                info!("Session {} removed", id);
            }
            None => debug!("disconnect_session: no session {}", id),
        }
        self.release_lock(id, &lock);
    }

    /// Drop the lock entry for `id` unless a session or another waiter
    /// still needs it. Called with `lock` held.
    fn release_lock(&self, id: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        if self.sessions.contains_key(id) {
            return;
        }
        // Map entry plus our clone; any more means someone is queued on it
        self.id_locks
            .remove_if(id, |_, entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) <= 2);
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.id_locks.len()
    }

    pub async fn disconnect_all(&self) {
        let ids = self.session_ids();
        if !ids.is_empty() {
            info!("Disconnecting {} session(s)", ids.len());
        }
        for id in ids {
            self.disconnect_session(&id).await;
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.get_connection(id)
            .map(|session| session.is_connected())
            .unwrap_or(false)
    }
}
