//! Host key memory for trust-on-first-use verification
//!
//! Keeps its own `known_hosts`-format file under the application directory so
//! auto-accepted wargame hosts never end up in the user's `~/.ssh`.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::SshError;

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyVerification {
    /// Key matches the stored entry
    Verified,
    /// First time we see this host/key type
    Unknown { fingerprint: String },
    /// Stored key differs (potential MITM)
    Changed {
        expected_fingerprint: String,
        actual_fingerprint: String,
    },
}

/// (key type, base64 key blob)
type StoredKey = (String, String);

pub struct KnownHostsStore {
    hosts: RwLock<HashMap<String, Vec<StoredKey>>>,
    path: Option<PathBuf>,
}

impl KnownHostsStore {
    /// Load from `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hosts = match Self::read_file(&path) {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!("Failed to read known hosts {:?}: {}", path, e);
                HashMap::new()
            }
        };
        Self {
            hosts: RwLock::new(hosts),
            path: Some(path),
        }
    }

    /// In-memory store that forgets everything on exit
    pub fn ephemeral() -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    fn read_file(path: &Path) -> Result<HashMap<String, Vec<StoredKey>>, SshError> {
        let mut hosts: HashMap<String, Vec<StoredKey>> = HashMap::new();
        if !path.exists() {
            return Ok(hosts);
        }

        let content = fs::read_to_string(path)?;
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(names), Some(key_type), Some(key_data)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            for name in names.split(',') {
                hosts
                    .entry(name.to_lowercase())
                    .or_default()
                    .push((key_type.to_string(), key_data.to_string()));
            }
        }

        debug!("Loaded {} known hosts from {:?}", hosts.len(), path);
        Ok(hosts)
    }

    /// `host` for port 22, `[host]:port` otherwise
    fn entry_name(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        }
    }

    fn fingerprint_of(blob: &[u8]) -> String {
        let hash = Sha256::digest(blob);
        format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
    }

    /// SHA256 fingerprint in OpenSSH notation
    pub fn fingerprint(key: &PublicKey) -> String {
        Self::fingerprint_of(&key.public_key_bytes())
    }

    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerification {
        let name = Self::entry_name(host, port);
        let key_type = key.algorithm().as_str().to_string();
        let blob = BASE64.encode(key.public_key_bytes());
        let fingerprint = Self::fingerprint(key);

        let hosts = self.hosts.read();
        let stored = hosts
            .get(&name)
            .and_then(|keys| keys.iter().find(|(t, _)| *t == key_type));

        match stored {
            Some((_, data)) if *data == blob => HostKeyVerification::Verified,
            Some((_, data)) => {
                let expected_fingerprint = BASE64
                    .decode(data)
                    .map(|bytes| Self::fingerprint_of(&bytes))
                    .unwrap_or_else(|_| "unknown".to_string());
                HostKeyVerification::Changed {
                    expected_fingerprint,
                    actual_fingerprint: fingerprint,
                }
            }
            None => HostKeyVerification::Unknown { fingerprint },
        }
    }

    /// Remember a key, appending it to the backing file if there is one
    pub fn add_host(&self, host: &str, port: u16, key: &PublicKey) -> Result<(), SshError> {
        let name = Self::entry_name(host, port);
        let key_type = key.algorithm().as_str().to_string();
        let blob = BASE64.encode(key.public_key_bytes());

        self.remember(&name, &key_type, &blob);

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{} {} {}", name, key_type, blob)?;
        }

        info!("Remembered {} host key for {}", key_type, name);
        Ok(())
    }

    fn remember(&self, name: &str, key_type: &str, blob: &str) {
        self.hosts
            .write()
            .entry(name.to_string())
            .or_default()
            .push((key_type.to_string(), blob.to_string()));
    }

    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.read().is_empty()
    }
}
