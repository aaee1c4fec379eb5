//! Application context
//!
//! Everything the console needs, built once at startup and passed in.
//! No globals: tests build the same context from a temp dir and a
//! scripted connector.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{self, AppConfig, ConfigStorage, StorageError};
use crate::level::LevelCatalog;
use crate::mentor::{AiMentor, ChatClient, OpenAiChatClient};
use crate::session::SessionRegistry;
use crate::ssh::{
    ChannelNotifier, Connector, KnownHostsStore, Notice, Notifier, RusshConnector, TracingNotifier,
};
use crate::state::{CommandHistory, FileCache, SessionStore};

const SESSIONS_FILE: &str = "sessions.json";
const HISTORY_FILE: &str = "history.json";

pub struct AppContext {
    pub config: AppConfig,
    pub registry: Arc<SessionRegistry>,
    pub levels: LevelCatalog,
    pub mentor: AiMentor,
    pub history: CommandHistory,
    pub sessions: SessionStore,
    pub cache: Option<Arc<FileCache>>,
    /// Notices from sessions and the mentor, drained by the console loop
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

impl AppContext {
    /// Context for the real application: config from `storage`, data under
    /// the config directory, russh for transport
    pub async fn load(storage: &ConfigStorage) -> Result<Self, StorageError> {
        let config = storage.load().await?;
        let data_dir = config::config_dir()?;

        let known_hosts = Arc::new(KnownHostsStore::open(config::known_hosts_file()?));
        let connector: Arc<dyn Connector> = Arc::new(RusshConnector::new(known_hosts));

        let chat: Option<Arc<dyn ChatClient>> = if config.ai.enabled {
            OpenAiChatClient::from_settings(&config.ai).map(|client| {
                info!("AI mentor using model {}", client.model());
                Arc::new(client) as Arc<dyn ChatClient>
            })
        } else {
            info!("AI mentor disabled in configuration");
            None
        };

        Ok(Self::from_parts(config, &data_dir, connector, chat))
    }

    pub fn from_parts(
        config: AppConfig,
        data_dir: &Path,
        connector: Arc<dyn Connector>,
        chat: Option<Arc<dyn ChatClient>>,
    ) -> Self {
        let (channel, notices) = ChannelNotifier::new();
        let notifier: Arc<dyn Notifier> = Arc::new(move |notice: Notice| {
            TracingNotifier.notify(notice.clone());
            channel.notify(notice);
        });

        let cache = open_cache(&config, data_dir);

        let mut levels = LevelCatalog::load(config.levels.path.as_deref());
        if let Some(cache) = &cache {
            levels = levels.with_cache(cache.clone());
        }

        let mut mentor = AiMentor::new(chat, notifier.clone())
            .with_context_commands(config.ai.max_context_commands)
            .with_fallback(config.ai.fallback)
            .with_api_key_env(&config.ai.api_key_env);
        if let Some(cache) = &cache {
            mentor = mentor.with_cache(cache.clone());
        }

        let history = if config.history.persist {
            CommandHistory::persistent(config.history.max_commands, data_dir.join(HISTORY_FILE))
        } else {
            CommandHistory::new(config.history.max_commands)
        };

        let sessions = SessionStore::open(data_dir.join(SESSIONS_FILE));
        let registry = Arc::new(SessionRegistry::new(connector, notifier));

        Self {
            config,
            registry,
            levels,
            mentor,
            history,
            sessions,
            cache,
            notices,
        }
    }
}

fn open_cache(config: &AppConfig, data_dir: &Path) -> Option<Arc<FileCache>> {
    if !config.cache.enable {
        return None;
    }
    let dir: PathBuf = config
        .cache
        .path
        .clone()
        .unwrap_or_else(|| data_dir.join("cache"));
    match FileCache::new(&dir, Duration::from_secs(config.cache.ttl_secs)) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!("Cache disabled, could not open {:?}: {}", dir, e);
            None
        }
    }
}
