//! AI mentor
//!
//! Guides the player with hints instead of solutions. Replies stream from a
//! `ChatClient`; canned level hints and command explanations come from the
//! bundled `data/mentor.json`.

mod client;

pub use client::{ChatClient, ChatMessage, OpenAiChatClient, Role};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ssh::{Notice, Notifier};
use crate::state::FileCache;

const BUNDLED_DATA: &str = include_str!("../../data/mentor.json");

/// Messages of earlier exchanges sent along with a question
const HISTORY_WINDOW: usize = 10;
/// Characters of recent terminal output included as context
const OUTPUT_WINDOW: usize = 500;
const DEFAULT_CONTEXT_COMMANDS: usize = 5;
const CACHE_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_HINT: &str = "Think about what the level description is asking you to find or do. Break down the problem into smaller steps.";
const SERVICE_APOLOGY: &str =
    "I'm sorry, there was an error with the AI mentor service. Please try again later.";
const GENERIC_APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again later.";

const SYSTEM_PROMPT: &str = r#"You are an AI mentor for the OverTheWire Bandit wargame, helping beginners learn cybersecurity and the Linux command line. Guide, hint and explain WITHOUT giving direct solutions.

Rules:
1. Never provide the exact commands or steps that solve the level.
2. Never reveal passwords or direct answers.
3. Point toward concepts to research and what to look for.
4. Explain relevant Linux commands in general terms, with examples outside the current level.
5. Encourage experimentation and ask leading questions.

Be encouraging, friendly and concise. Pay attention to the current level, the player's recent commands and terminal output, and build on earlier conversation."#;

#[derive(Debug, Error)]
pub enum MentorError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Canned hints and explanations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentorData {
    #[serde(default)]
    pub level_hints: HashMap<String, String>,
    #[serde(default)]
    pub command_explanations: HashMap<String, String>,
}

impl MentorData {
    pub fn bundled() -> Self {
        serde_json::from_str(BUNDLED_DATA).unwrap_or_else(|e| {
            warn!("Bundled mentor data unreadable: {}", e);
            Self::default()
        })
    }
}

/// What the player is looking at when they ask
#[derive(Debug, Clone, Default)]
pub struct MentorContext<'a> {
    pub level: u32,
    pub recent_commands: &'a [String],
    pub terminal_output: &'a str,
}

pub struct AiMentor {
    client: Option<Arc<dyn ChatClient>>,
    notifier: Arc<dyn Notifier>,
    conversations: HashMap<String, Vec<ChatMessage>>,
    data: MentorData,
    cache: Option<Arc<FileCache>>,
    context_commands: usize,
    fallback: bool,
    disabled_message: String,
}

impl AiMentor {
    /// `client == None` leaves the mentor disabled
    pub fn new(client: Option<Arc<dyn ChatClient>>, notifier: Arc<dyn Notifier>) -> Self {
        if client.is_none() {
            info!("AI mentor disabled, no chat client configured");
        }
        Self {
            client,
            notifier,
            conversations: HashMap::new(),
            data: MentorData::bundled(),
            cache: None,
            context_commands: DEFAULT_CONTEXT_COMMANDS,
            fallback: false,
            disabled_message: "AI mentor is currently disabled. Please set your OpenAI API key to enable this feature."
                .to_string(),
        }
    }

    pub fn with_data(mut self, data: MentorData) -> Self {
        self.data = data;
        self
    }

    pub fn with_cache(mut self, cache: Arc<FileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_context_commands(mut self, count: usize) -> Self {
        self.context_commands = count;
        self
    }

    /// Append the level hint to apologies when the service fails
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Name the environment variable in the "disabled" reply
    pub fn with_api_key_env(mut self, env: &str) -> Self {
        self.disabled_message = format!(
            "AI mentor is currently disabled. Please set your OpenAI API key ({}) to enable this feature.",
            env
        );
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn context_message(&self, ctx: &MentorContext<'_>) -> String {
        let mut parts = vec![format!("Current level: Bandit Level {}", ctx.level)];

        if !ctx.recent_commands.is_empty() {
            let skip = ctx.recent_commands.len().saturating_sub(self.context_commands);
            parts.push(format!(
                "Recent commands: {}",
                ctx.recent_commands[skip..].join(", ")
            ));
        }

        if !ctx.terminal_output.is_empty() {
            parts.push(format!(
                "Recent terminal output: {}",
                tail_chars(ctx.terminal_output, OUTPUT_WINDOW)
            ));
        }

        parts.join("\n")
    }

    fn build_messages(&self, session_id: &str, message: &str, ctx: &MentorContext<'_>) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

        if let Some(history) = self.conversations.get(session_id) {
            let skip = history.len().saturating_sub(HISTORY_WINDOW);
            messages.extend(history[skip..].iter().cloned());
        }

        messages.push(ChatMessage::system(format!(
            "Current context: {}",
            self.context_message(ctx)
        )));
        messages.push(ChatMessage::user(message));
        messages
    }

    /// Ask the mentor; tokens go to `on_token` as they arrive
    ///
    /// Never fails: errors are reported through the notifier and answered
    /// with an apology. The exchange is remembered only when it succeeded.
    pub async fn respond(
        &mut self,
        session_id: &str,
        message: &str,
        ctx: &MentorContext<'_>,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> String {
        let Some(client) = self.client.clone() else {
            on_token(self.disabled_message.as_str());
            return self.disabled_message.clone();
        };

        let messages = self.build_messages(session_id, message, ctx);
        debug!("Mentor request with {} messages", messages.len());

        match client.stream_chat(&messages, &mut *on_token).await {
            Ok(reply) => {
                let history = self.conversations.entry(session_id.to_string()).or_default();
                history.push(ChatMessage::user(message));
                history.push(ChatMessage::assistant(reply.clone()));
                reply
            }
            Err(e) => {
                warn!("Mentor request failed: {}", e);
                self.notifier
                    .notify(Notice::error(format!("AI mentor error: {}", e)));

                let mut reply = match e {
                    MentorError::Api { .. } => SERVICE_APOLOGY.to_string(),
                    _ => GENERIC_APOLOGY.to_string(),
                };
                if self.fallback {
                    reply.push_str(&format!("\n\nHint: {}", self.level_hint(ctx.level)));
                }
                on_token(reply.as_str());
                reply
            }
        }
    }

    pub fn clear_conversation(&mut self, session_id: &str) {
        self.conversations.remove(session_id);
    }

    pub fn conversation(&self, session_id: &str) -> &[ChatMessage] {
        self.conversations
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Spoiler-free nudge for a level
    pub fn level_hint(&self, level: u32) -> String {
        self.memoized(&format!("level_hint_{}", level), || {
            self.data
                .level_hints
                .get(&level.to_string())
                .cloned()
                .unwrap_or_else(|| DEFAULT_HINT.to_string())
        })
    }

    pub fn explain_command(&self, command: &str) -> String {
        let command = command.trim();
        self.memoized(&format!("command_explanation_{}", command), || {
            self.data
                .command_explanations
                .get(&command.to_lowercase())
                .cloned()
                .unwrap_or_else(|| {
                    format!(
                        "'{}' is a Linux command. Try 'man {}' to learn more about it.",
                        command, command
                    )
                })
        })
    }

    fn memoized(&self, key: &str, compute: impl FnOnce() -> String) -> String {
        match &self.cache {
            Some(cache) => cache.get_or_insert_with(key, Some(CACHE_TTL), compute),
            None => compute(),
        }
    }
}

/// Last `n` characters of `text`
fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::Severity;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    /// Replies with fixed tokens and records what it was sent
    struct FakeClient {
        tokens: Vec<&'static str>,
        fail: bool,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl FakeClient {
        fn replying(tokens: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                tokens,
                fail: false,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                tokens: Vec::new(),
                fail: true,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatClient for FakeClient {
        async fn stream_chat(
            &self,
            messages: &[ChatMessage],
            on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
        ) -> Result<String, MentorError> {
            self.seen.lock().push(messages.to_vec());
            if self.fail {
                return Err(MentorError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            let mut reply = String::new();
            for token in &self.tokens {
                on_token(*token);
                reply.push_str(token);
            }
            Ok(reply)
        }
    }

    fn collecting_notifier() -> (Arc<dyn Notifier>, Arc<Mutex<Vec<Notice>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier: Arc<dyn Notifier> = Arc::new(move |notice: Notice| sink.lock().push(notice));
        (notifier, seen)
    }

    #[tokio::test]
    async fn test_streams_tokens_and_records_exchange() {
        let client = FakeClient::replying(vec!["Try ", "ls -a"]);
        let (notifier, _) = collecting_notifier();
        let mut mentor = AiMentor::new(Some(client.clone()), notifier);

        let mut streamed = Vec::new();
        let reply = mentor
            .respond("s1", "where is it?", &MentorContext::default(), &mut |t| {
                streamed.push(t.to_string())
            })
            .await;

        assert_eq!(reply, "Try ls -a");
        assert_eq!(streamed, vec!["Try ", "ls -a"]);
        assert_eq!(mentor.conversation("s1").len(), 2);
        assert!(mentor.conversation("other").is_empty());
    }

    #[tokio::test]
    async fn test_context_and_history_window() {
        let client = FakeClient::replying(vec!["ok"]);
        let (notifier, _) = collecting_notifier();
        let mut mentor = AiMentor::new(Some(client.clone()), notifier);

        for i in 0..7 {
            mentor
                .respond("s1", &format!("q{}", i), &MentorContext::default(), &mut |_| {})
                .await;
        }

        let commands: Vec<String> = (0..8).map(|i| format!("cmd{}", i)).collect();
        let output = "x".repeat(600);
        let ctx = MentorContext {
            level: 3,
            recent_commands: &commands,
            terminal_output: &output,
        };
        mentor.respond("s1", "help", &ctx, &mut |_| {}).await;

        let sent = client.seen.lock().last().cloned().unwrap();
        // system + 10 history + context + question
        assert_eq!(sent.len(), 13);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[12], ChatMessage::user("help"));

        let context = &sent[11].content;
        assert!(context.contains("Current level: Bandit Level 3"));
        assert!(context.contains("Recent commands: cmd3, cmd4, cmd5, cmd6, cmd7"));
        assert!(context.ends_with(&"x".repeat(500)));
        assert!(!context.contains(&"x".repeat(501)));
    }

    #[tokio::test]
    async fn test_failure_apologizes_and_notifies() {
        let (notifier, notices) = collecting_notifier();
        let mut mentor = AiMentor::new(Some(FakeClient::failing()), notifier).with_fallback(true);

        let mut streamed = String::new();
        let reply = mentor
            .respond("s1", "hi", &MentorContext::default(), &mut |t| streamed.push_str(t))
            .await;

        assert!(reply.starts_with(SERVICE_APOLOGY));
        assert!(reply.contains("Hint: "));
        assert_eq!(streamed, reply);
        assert!(mentor.conversation("s1").is_empty());

        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_disabled_mentor() {
        let (notifier, _) = collecting_notifier();
        let mut mentor = AiMentor::new(None, notifier).with_api_key_env("OPENAI_API_KEY");
        assert!(!mentor.is_enabled());

        let reply = mentor
            .respond("s1", "hi", &MentorContext::default(), &mut |_| {})
            .await;
        assert!(reply.starts_with("AI mentor is currently disabled"));
        assert!(reply.contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_clear_conversation() {
        let (notifier, _) = collecting_notifier();
        let mut mentor = AiMentor::new(Some(FakeClient::replying(vec!["a"])), notifier);
        mentor
            .respond("s1", "q", &MentorContext::default(), &mut |_| {})
            .await;
        mentor.clear_conversation("s1");
        assert!(mentor.conversation("s1").is_empty());
    }

    #[test]
    fn test_hints_and_explanations() {
        let (notifier, _) = collecting_notifier();
        let mentor = AiMentor::new(None, notifier);

        assert!(mentor.level_hint(1).contains("home directory"));
        assert_eq!(mentor.level_hint(999), DEFAULT_HINT);
        assert!(mentor.explain_command("LS").starts_with("ls lists"));
        assert_eq!(
            mentor.explain_command("nmap"),
            "'nmap' is a Linux command. Try 'man nmap' to learn more about it."
        );
    }

    #[test]
    fn test_hints_are_memoized() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(FileCache::new(dir.path(), CACHE_TTL).unwrap());
        let (notifier, _) = collecting_notifier();
        let mentor = AiMentor::new(None, notifier).with_cache(cache.clone());

        let hint = mentor.level_hint(2);
        assert_eq!(cache.get::<String>("level_hint_2"), Some(hint));

        mentor.explain_command("cat");
        assert!(cache.get::<String>("command_explanation_cat").is_some());
    }

    #[test]
    fn test_tail_chars_respects_boundaries() {
        assert_eq!(tail_chars("héllo", 3), "llo");
        assert_eq!(tail_chars("日本語テキスト", 2), "スト");
        assert_eq!(tail_chars("ab", 5), "ab");
    }
}
