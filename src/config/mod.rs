//! Configuration Management Module
//!
//! Typed application settings persisted as JSON, with dotted-path access for
//! the `config` subcommand.

pub mod storage;
pub mod types;

pub use storage::{
    config_dir, config_file, default_cache_dir, known_hosts_file, log_dir, ConfigStorage,
    StorageError,
};
pub use types::{
    AiSettings, AppConfig, CacheSettings, HistorySettings, LevelSettings, SshSettings,
    UiSettings, CONFIG_VERSION,
};
