//! Shell command history with up/down navigation

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Most recent command first
pub struct CommandHistory {
    commands: Vec<String>,
    max_size: usize,
    /// `None` means "not navigating"
    cursor: Option<usize>,
    path: Option<PathBuf>,
}

impl CommandHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            commands: Vec::new(),
            max_size,
            cursor: None,
            path: None,
        }
    }

    /// History backed by a JSON file; load failures keep an empty history
    pub fn persistent(max_size: usize, path: impl Into<PathBuf>) -> Self {
        let mut history = Self {
            path: Some(path.into()),
            ..Self::new(max_size)
        };
        if let Err(e) = history.load() {
            warn!("Could not load command history: {}", e);
        }
        history
    }

    fn load(&mut self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let mut commands: Vec<String> = serde_json::from_str(&fs::read_to_string(path)?)?;
        commands.truncate(self.max_size);
        self.commands = commands;
        Ok(())
    }

    fn save(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(&self.commands)?)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("Could not save command history: {}", e);
        }
    }

    /// Record a command; repeats move to the front instead of duplicating
    pub fn add_command(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }

        self.commands.retain(|c| c != command);
        self.commands.insert(0, command.to_string());
        self.commands.truncate(self.max_size);
        self.cursor = None;
        self.persist();
    }

    /// Step back in time; `None` when already at the oldest entry
    pub fn previous_command(&mut self) -> Option<&str> {
        let next = match self.cursor {
            None if !self.commands.is_empty() => 0,
            Some(i) if i + 1 < self.commands.len() => i + 1,
            _ => return None,
        };
        self.cursor = Some(next);
        self.commands.get(next).map(String::as_str)
    }

    /// Step forward; stepping past the newest entry yields `""`
    pub fn next_command(&mut self) -> Option<&str> {
        match self.cursor {
            Some(0) => {
                self.cursor = None;
                Some("")
            }
            Some(i) => {
                self.cursor = Some(i - 1);
                self.commands.get(i - 1).map(String::as_str)
            }
            None => None,
        }
    }

    pub fn reset_index(&mut self) {
        self.cursor = None;
    }

    pub fn all_commands(&self) -> Vec<String> {
        self.commands.clone()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = None;
        self.persist();
    }
}
