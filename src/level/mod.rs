//! Bandit level catalog
//!
//! Level goals, suggested commands and reading material, loaded from JSON
//! (`"<level>": { goal, commands, reading_material }`).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::FileCache;

const BUNDLED_LEVELS: &str = include_str!("../../data/levels.json");

/// Memoized catalog lookups live this long
const CACHE_TTL: Duration = Duration::from_secs(3600);

const GOAL_UNAVAILABLE: &str = "Level information not available";

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid level catalog: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingMaterial {
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub reading_material: Vec<ReadingMaterial>,
}

pub struct LevelCatalog {
    levels: BTreeMap<u32, LevelInfo>,
    cache: Option<Arc<FileCache>>,
}

impl LevelCatalog {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let raw: BTreeMap<String, LevelInfo> = serde_json::from_str(json)?;
        let mut levels = BTreeMap::new();
        for (key, info) in raw {
            match key.trim().parse::<u32>() {
                Ok(n) => {
                    levels.insert(n, info);
                }
                Err(_) => warn!("Skipping level entry with non-numeric key {:?}", key),
            }
        }
        Ok(Self {
            levels,
            cache: None,
        })
    }

    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_LEVELS).unwrap_or_else(|e| {
            warn!("Bundled level catalog unreadable: {}", e);
            Self {
                levels: BTreeMap::new(),
                cache: None,
            }
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, LevelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Catalog at `path` if given and readable, the bundled one otherwise
    pub fn load(path: Option<&Path>) -> Self {
        match path.map(Self::from_path) {
            Some(Ok(catalog)) => {
                debug!("Loaded {} levels from {:?}", catalog.levels.len(), path);
                catalog
            }
            Some(Err(e)) => {
                warn!("Could not load level catalog {:?}: {}, using bundled", path, e);
                Self::bundled()
            }
            None => Self::bundled(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<FileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn level_info(&self, level: u32) -> Option<LevelInfo> {
        let key = format!("level_info_{}", level);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get::<LevelInfo>(&key)) {
            return Some(hit);
        }

        let info = self.levels.get(&level).cloned()?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key, &info, Some(CACHE_TTL)) {
                warn!("Could not cache {}: {}", key, e);
            }
        }
        Some(info)
    }

    pub fn level_goal(&self, level: u32) -> String {
        self.level_info(level)
            .map(|info| info.goal)
            .filter(|goal| !goal.is_empty())
            .unwrap_or_else(|| GOAL_UNAVAILABLE.to_string())
    }

    pub fn recommended_commands(&self, level: u32) -> Vec<String> {
        self.level_info(level)
            .map(|info| info.commands)
            .unwrap_or_default()
    }

    pub fn reading_materials(&self, level: u32) -> Vec<ReadingMaterial> {
        self.level_info(level)
            .map(|info| info.reading_material)
            .unwrap_or_default()
    }

    /// Highest level in the catalog, 0 when empty
    pub fn max_level(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Markdown summary of a level
    pub fn format_level_info(&self, level: u32) -> String {
        let Some(info) = self.level_info(level) else {
            return format!("Level {} information not available", level);
        };

        let key = format!("formatted_level_info_{}", level);
        match &self.cache {
            Some(cache) => cache.get_or_insert_with(&key, Some(CACHE_TTL), || render(level, &info)),
            None => render(level, &info),
        }
    }
}

fn render(level: u32, info: &LevelInfo) -> String {
    let mut out = format!("# Bandit Level {}\n\n", level);

    if !info.goal.is_empty() {
        out.push_str(&format!("## Goal\n{}\n\n", info.goal));
    }

    if !info.commands.is_empty() {
        out.push_str("## Recommended Commands\n");
        for command in &info.commands {
            out.push_str(&format!("- {}\n", command));
        }
        out.push('\n');
    }

    if !info.reading_material.is_empty() {
        out.push_str("## Reading Materials\n");
        for material in &info.reading_material {
            match (material.title.is_empty(), material.url.is_empty()) {
                (false, false) => out.push_str(&format!("- [{}]({})\n", material.title, material.url)),
                (false, true) => out.push_str(&format!("- {}\n", material.title)),
                _ => {}
            }
        }
        out.push('\n');
    }

    out
}
