//! Session metadata persistence
//!
//! Remembers which wargame logins the user has made (host, user, level) in
//! `sessions.json`. Independent of live connections; the registry owns those.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub level: u32,
}

/// Fields to change in `update_session`; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub level: Option<u32>,
}

impl SessionUpdate {
    pub fn level(level: u32) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }
}

pub struct SessionStore {
    sessions: BTreeMap<String, SessionInfo>,
    current: Option<String>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Load from `path`; unreadable files start an empty store
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sessions = match Self::read(&path) {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Could not load sessions file {:?}: {}", path, e);
                BTreeMap::new()
            }
        };
        debug!("Loaded {} saved session(s)", sessions.len());
        Self {
            sessions,
            current: None,
            path: Some(path),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            sessions: BTreeMap::new(),
            current: None,
            path: None,
        }
    }

    fn read(path: &PathBuf) -> Result<BTreeMap<String, SessionInfo>, SessionStoreError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = (|| -> Result<(), SessionStoreError> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&self.sessions)?)?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!("Could not save sessions file {:?}: {}", path, e);
        }
    }

    pub fn create_session(
        &mut self,
        id: &str,
        name: &str,
        hostname: &str,
        port: u16,
        username: &str,
        level: u32,
    ) -> SessionInfo {
        let now = Utc::now();
        let info = SessionInfo {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now,
            last_used: now,
            hostname: hostname.to_string(),
            port,
            username: username.to_string(),
            level,
        };
        self.sessions.insert(id.to_string(), info.clone());
        self.persist();
        info
    }

    pub fn get_session(&self, id: &str) -> Option<&SessionInfo> {
        self.sessions.get(id)
    }

    pub fn all_sessions(&self) -> Vec<&SessionInfo> {
        self.sessions.values().collect()
    }

    /// Apply `update` and bump `last_used`; unknown ids are ignored
    pub fn update_session(&mut self, id: &str, update: SessionUpdate) {
        let Some(info) = self.sessions.get_mut(id) else {
            return;
        };
        if let Some(name) = update.name {
            info.name = name;
        }
        if let Some(hostname) = update.hostname {
            info.hostname = hostname;
        }
        if let Some(port) = update.port {
            info.port = port;
        }
        if let Some(username) = update.username {
            info.username = username;
        }
        if let Some(level) = update.level {
            info.level = level;
        }
        info.last_used = Utc::now();
        self.persist();
    }

    pub fn delete_session(&mut self, id: &str) {
        if self.sessions.remove(id).is_some() {
            if self.current.as_deref() == Some(id) {
                self.current = None;
            }
            self.persist();
        }
    }

    /// Only known ids can become current
    pub fn set_current_session(&mut self, id: &str) {
        if self.sessions.contains_key(id) {
            self.current = Some(id.to_string());
            self.update_session(id, SessionUpdate::default());
        }
    }

    pub fn current_session(&self) -> Option<&SessionInfo> {
        self.current.as_deref().and_then(|id| self.sessions.get(id))
    }

    pub fn session_exists(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }
}
