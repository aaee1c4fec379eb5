//! SSH Configuration

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::error::SshError;

/// Opaque login secret
///
/// The plaintext never shows up in `Debug` output or logs and is wiped from
/// memory when the last copy is dropped.
#[derive(Clone, Default)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// SSH connection configuration for one Transport Session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Remote host address
    pub host: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password; never persisted
    #[serde(skip)]
    pub credential: Credential,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Terminal columns
    #[serde(default = "default_cols")]
    pub cols: u32,

    /// Terminal rows
    #[serde(default = "default_rows")]
    pub rows: u32,
}

impl SshConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: impl Into<Credential>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            credential: credential.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_size(mut self, cols: u32, rows: u32) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// `user@host:port`, for logs and notices
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Reject targets that can never be dialed
    pub fn validate(&self) -> Result<(), SshError> {
        if self.host.trim().is_empty() {
            return Err(SshError::InvalidTarget("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(SshError::InvalidTarget(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        if self.username.is_empty() {
            return Err(SshError::InvalidTarget("username is empty".to_string()));
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    2220
}

fn default_timeout() -> u64 {
    10
}

fn default_cols() -> u32 {
    80
}

fn default_rows() -> u32 {
    24
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: "bandit.labs.overthewire.org".to_string(),
            port: default_port(),
            username: String::new(),
            credential: Credential::default(),
            timeout_secs: default_timeout(),
            cols: default_cols(),
            rows: default_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_is_redacted() {
        let config = SshConfig::new("localhost", 22, "bandit0", "hunter2");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Credential(***)"));
        assert_eq!(config.credential.expose(), "hunter2");
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let config = SshConfig::new("localhost", 0, "bandit0", "pw");
        assert!(matches!(config.validate(), Err(SshError::InvalidTarget(_))));
    }

    #[test]
    fn test_defaults() {
        let config = SshConfig::default();
        assert_eq!(config.port, 2220);
        assert_eq!((config.cols, config.rows), (80, 24));
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_credential_not_serialized() {
        let config = SshConfig::new("localhost", 2220, "bandit0", "secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
