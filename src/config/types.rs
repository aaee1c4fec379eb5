//! Configuration types
//!
//! Every field has a default, so a partial file on disk is merged with the
//! defaults field by field.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::storage::StorageError;
use crate::ssh::{Credential, RetryPolicy, SshConfig};

/// Current config format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    pub ssh: SshSettings,
    pub ui: UiSettings,
    pub ai: AiSettings,
    pub history: HistorySettings,
    pub cache: CacheSettings,
    pub levels: LevelSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            ssh: SshSettings::default(),
            ui: UiSettings::default(),
            ai: AiSettings::default(),
            history: HistorySettings::default(),
            cache: CacheSettings::default(),
            levels: LevelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    /// Connect attempts per `:connect`
    pub retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            host: "bandit.labs.overthewire.org".to_string(),
            port: 2220,
            timeout_secs: 10,
            retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl SshSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries).with_delay(Duration::from_millis(self.retry_backoff_ms))
    }

    /// Connection parameters for one login; `port` overrides the default
    pub fn session_config(
        &self,
        username: &str,
        credential: Credential,
        port: Option<u16>,
    ) -> SshConfig {
        SshConfig::new(
            self.host.clone(),
            port.unwrap_or(self.port),
            username,
            credential,
        )
        .with_timeout_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub theme: String,
    pub max_recent_commands: usize,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            max_recent_commands: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub model: String,
    /// OpenAI-compatible endpoint root
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_context_commands: usize,
    /// Answer with canned hints when the API is unreachable
    pub fallback: bool,
    pub enabled: bool,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_context_commands: 5,
            fallback: true,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub max_commands: usize,
    pub persist: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_commands: 100,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enable: bool,
    /// `None` means `<config dir>/cache`
    pub path: Option<PathBuf>,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enable: true,
            path: None,
            ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelSettings {
    /// Level catalog JSON; `None` uses the bundled catalog
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Look up a value by dotted path, e.g. `ssh.port`
    pub fn get_path(&self, path: &str) -> Result<Value, StorageError> {
        let root = serde_json::to_value(self)?;
        let mut node = &root;
        for key in path.split('.') {
            node = node
                .get(key)
                .ok_or_else(|| StorageError::UnknownKey(path.to_string()))?;
        }
        Ok(node.clone())
    }

    /// Set a value by dotted path from its textual form
    ///
    /// String fields take the text verbatim; anything else is parsed as JSON.
    /// The result must still deserialize into `AppConfig`, otherwise `self`
    /// is left untouched.
    pub fn set_path(&mut self, path: &str, raw: &str) -> Result<(), StorageError> {
        let mut root = serde_json::to_value(&*self)?;

        let mut node = &mut root;
        for key in path.split('.') {
            node = node
                .get_mut(key)
                .ok_or_else(|| StorageError::UnknownKey(path.to_string()))?;
        }
        if node.is_object() {
            return Err(StorageError::InvalidValue {
                path: path.to_string(),
                reason: "cannot replace a whole section".to_string(),
            });
        }

        let replacement = match node {
            Value::String(_) => Value::String(raw.to_string()),
            Value::Null => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            }
            _ => serde_json::from_str(raw).map_err(|e| StorageError::InvalidValue {
                path: path.to_string(),
                reason: e.to_string(),
            })?,
        };
        *node = replacement;

        let updated: AppConfig =
            serde_json::from_value(root).map_err(|e| StorageError::InvalidValue {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.ssh.host, "bandit.labs.overthewire.org");
        assert_eq!(config.ssh.port, 2220);
        assert_eq!(config.ui.max_recent_commands, 10);
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert_eq!(config.history.max_commands, 100);
        assert!(config.cache.enable);
    }

    #[test]
    fn test_partial_json_merges_with_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"ssh": {"port": 2221}, "ui": {"theme": "light"}}"#).unwrap();
        assert_eq!(config.ssh.port, 2221);
        assert_eq!(config.ssh.host, "bandit.labs.overthewire.org");
        assert_eq!(config.ui.theme, "light");
        assert_eq!(config.ui.max_recent_commands, 10);
        assert_eq!(config.version, CONFIG_VERSION);
    }

    #[test]
    fn test_get_path() {
        let config = AppConfig::default();
        assert_eq!(config.get_path("ssh.port").unwrap(), Value::from(2220));
        assert_eq!(config.get_path("ai.fallback").unwrap(), Value::Bool(true));
        assert!(matches!(
            config.get_path("ssh.nope"),
            Err(StorageError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_path_typed() {
        let mut config = AppConfig::default();
        config.set_path("ssh.port", "2221").unwrap();
        config.set_path("ui.theme", "solarized").unwrap();
        config.set_path("history.persist", "false").unwrap();
        config.set_path("cache.path", "/tmp/bandit-cache").unwrap();

        assert_eq!(config.ssh.port, 2221);
        assert_eq!(config.ui.theme, "solarized");
        assert!(!config.history.persist);
        assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/bandit-cache")));
    }

    #[test]
    fn test_set_path_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.set_path("ssh.port", "70000").is_err());
        assert!(config.set_path("ssh.port", "abc").is_err());
        assert!(config.set_path("ssh", "1").is_err());
        assert!(config.set_path("nope.key", "1").is_err());
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_session_config_uses_settings() {
        let settings = SshSettings::default();
        let config = settings.session_config("bandit3", Credential::new("pw"), None);
        assert_eq!(config.port, 2220);
        assert_eq!(config.timeout_secs, 10);

        let config = settings.session_config("bandit3", Credential::new("pw"), Some(2221));
        assert_eq!(config.port, 2221);
        assert_eq!(config.target(), "bandit3@bandit.labs.overthewire.org:2221");
    }
}
