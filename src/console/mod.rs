//! Line-oriented console
//!
//! Reads lines from the user, routes `:` commands to the app and everything
//! else to the remote shell. Relayed output and notices arrive on mpsc
//! queues and are printed from the same loop, so nothing else ever touches
//! the writer.

pub mod commands;

use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::AppContext;
use crate::mentor::MentorContext;
use crate::ssh::{Credential, Notice, OutputSink, TransportSession};
use crate::state::SessionUpdate;

use commands::*;

const DEFAULT_SESSION_ID: &str = "default";

/// Bytes of relayed output kept for mentor context
const TERMINAL_BUFFER_LIMIT: usize = 16 * 1024;

const MSG_CONNECTED: &str = "SSH connection established";
const MSG_CONNECT_FAILED: &str =
    "Failed to establish SSH connection. Please check your credentials and network connection.";
const MSG_DISCONNECTED: &str = "SSH connection closed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// `:connect` waiting for its password line
struct PendingLogin {
    username: String,
    port: Option<u16>,
}

pub struct Console<W: Write + Send> {
    ctx: AppContext,
    out: W,
    session_id: String,
    level: u32,
    offline: bool,
    recent_commands: Vec<String>,
    terminal_output: String,
    pending_login: Option<PendingLogin>,
    output_tx: mpsc::UnboundedSender<String>,
    output_rx: mpsc::UnboundedReceiver<String>,
}

impl<W: Write + Send> Console<W> {
    pub fn new(ctx: AppContext, out: W) -> Self {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let level = ctx
            .sessions
            .get_session(DEFAULT_SESSION_ID)
            .map(|info| info.level)
            .unwrap_or(0);

        Self {
            ctx,
            out,
            session_id: DEFAULT_SESSION_ID.to_string(),
            level,
            offline: false,
            recent_commands: Vec::new(),
            terminal_output: String::new(),
            pending_login: None,
            output_tx,
            output_rx,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Read lines until `:quit`, end of input or Ctrl-C, then close every
    /// session. Hands the writer back.
    pub async fn run<R>(mut self, input: R) -> io::Result<W>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        self.say(&format!(
            "bandit-term: Bandit Level {}. Type :help for commands.",
            self.level
        ))?;

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if self.handle_line(&line).await? == Flow::Quit {
                            break;
                        }
                    }
                    None => break,
                },
                Some(chunk) = self.output_rx.recv() => self.show_output(&chunk)?,
                Some(notice) = self.ctx.notices.recv() => self.show_notice(&notice)?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.shutdown().await?;
        Ok(self.out)
    }

    /// Close every session and print whatever they reported on the way out
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.ctx.registry.disconnect_all().await;
        self.drain_events()
    }

    /// Print queued output and notices without waiting
    pub fn drain_events(&mut self) -> io::Result<()> {
        while let Ok(chunk) = self.output_rx.try_recv() {
            self.show_output(&chunk)?;
        }
        while let Ok(notice) = self.ctx.notices.try_recv() {
            self.show_notice(&notice)?;
        }
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        if let Some(login) = self.pending_login.take() {
            let password = line.trim_end_matches(['\r', '\n']);
            self.finish_login(login, password).await?;
            return Ok(Flow::Continue);
        }

        match parse(line) {
            Input::Empty => {}
            Input::Shell(command) => self.send_command(&command).await?,
            Input::Command(command) => return self.run_command(command).await,
        }
        Ok(Flow::Continue)
    }

    async fn run_command(&mut self, command: Command) -> io::Result<Flow> {
        debug!("Console command {:?}", command);
        match command {
            Command::Connect { username, port } => self.start_login(username, port.as_deref())?,
            Command::Disconnect => self.disconnect().await?,
            Command::Level(raw) => match raw.trim().parse::<u32>() {
                Ok(level) if level <= self.ctx.levels.max_level() => self.switch_level(level)?,
                Ok(level) => self.say(&format!("Level {} is not available", level))?,
                Err(_) => self.say("Usage: :level <n>")?,
            },
            Command::Next => {
                if self.level >= self.ctx.levels.max_level() {
                    self.say(MSG_LAST_LEVEL)?;
                } else {
                    self.switch_level(self.level + 1)?;
                }
            }
            Command::Prev => {
                if self.level == 0 {
                    self.say(MSG_FIRST_LEVEL)?;
                } else {
                    self.switch_level(self.level - 1)?;
                }
            }
            Command::Ask(message) => self.ask(&message).await?,
            Command::Hint => {
                let hint = self.ctx.mentor.level_hint(self.level);
                self.say(&format!("Hint: {}", hint))?;
            }
            Command::Explain(name) => {
                if name.trim().is_empty() {
                    self.say("Usage: :explain <command>")?;
                } else {
                    let text = self.ctx.mentor.explain_command(&name);
                    self.say(&text)?;
                }
            }
            Command::History => self.show_history()?,
            Command::Resize { cols, rows } => self.resize(&cols, &rows).await?,
            Command::Offline => self.toggle_offline().await?,
            Command::Help => self.say(HELP.trim_end())?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Unknown(name) => self.say(&format!(
                "Unknown command :{}. Type :help for a list of commands.",
                name
            ))?,
        }
        Ok(Flow::Continue)
    }

    fn start_login(&mut self, username: String, port: Option<&str>) -> io::Result<()> {
        if self.offline {
            return self.say(MSG_OFFLINE_CONNECT);
        }
        if username.is_empty() {
            return self.say(MSG_MISSING_CREDENTIALS);
        }
        let port = match validate_port(port) {
            Ok(port) => port,
            Err(message) => return self.say(message),
        };

        write!(self.out, "Password for {}: ", username)?;
        self.out.flush()?;
        self.pending_login = Some(PendingLogin { username, port });
        Ok(())
    }

    async fn finish_login(&mut self, login: PendingLogin, password: &str) -> io::Result<()> {
        writeln!(self.out)?;
        if password.is_empty() {
            return self.say(MSG_MISSING_CREDENTIALS);
        }

        let config = self.ctx.config.ssh.session_config(
            &login.username,
            Credential::new(password),
            login.port,
        );
        let policy = self.ctx.config.ssh.retry_policy();
        let (host, port) = (config.host.clone(), config.port);

        self.say(&format!("Connecting to {}...", config.target()))?;
        let connected = self
            .ctx
            .registry
            .create_connection_with_sink(&self.session_id, config, &policy, self.output_sink())
            .await;
        self.drain_events()?;

        if !connected {
            return self.say(MSG_CONNECT_FAILED);
        }

        if let Some(level) = level_from_username(&login.username) {
            self.level = level;
        }
        self.remember_session(&login.username, &host, port);
        self.say(MSG_CONNECTED)
    }

    fn remember_session(&mut self, username: &str, host: &str, port: u16) {
        let sessions = &mut self.ctx.sessions;
        if sessions.session_exists(&self.session_id) {
            sessions.update_session(
                &self.session_id,
                SessionUpdate {
                    name: Some(username.to_string()),
                    hostname: Some(host.to_string()),
                    port: Some(port),
                    username: Some(username.to_string()),
                    level: Some(self.level),
                },
            );
        } else {
            sessions.create_session(&self.session_id, username, host, port, username, self.level);
        }
        sessions.set_current_session(&self.session_id);
    }

    fn output_sink(&self) -> OutputSink {
        let tx = self.output_tx.clone();
        Arc::new(move |chunk: String| {
            // Receiver gone means the console is exiting
            let _ = tx.send(chunk);
        })
    }

    /// The session when it can carry input right now
    fn live_session(&self) -> Option<Arc<TransportSession>> {
        self.ctx
            .registry
            .get_connection(&self.session_id)
            .filter(|session| session.is_connected() && session.is_relay_running())
    }

    async fn send_command(&mut self, command: &str) -> io::Result<()> {
        if self.offline {
            return self.say(MSG_OFFLINE_SEND);
        }
        let Some(session) = self.live_session() else {
            return self.say(MSG_NOT_CONNECTED);
        };
        if too_long(command) {
            return self.say(MSG_COMMAND_TOO_LONG);
        }

        self.ctx.history.add_command(command);
        self.recent_commands.push(command.to_string());
        let max = self.ctx.config.ui.max_recent_commands;
        if self.recent_commands.len() > max {
            let excess = self.recent_commands.len() - max;
            self.recent_commands.drain(..excess);
        }

        session.send(&format!("{}\n", command)).await;
        self.drain_events()
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        if self.ctx.registry.get_connection(&self.session_id).is_none() {
            return self.say(MSG_NOT_CONNECTED);
        }
        self.ctx.registry.disconnect_session(&self.session_id).await;
        self.drain_events()?;
        self.say(MSG_DISCONNECTED)
    }

    async fn ask(&mut self, message: &str) -> io::Result<()> {
        if self.offline {
            return self.say(MSG_OFFLINE_MENTOR);
        }
        let message = message.trim();
        if message.is_empty() {
            return self.say("Usage: :ask <message>");
        }
        if too_long(message) {
            return self.say(MSG_MESSAGE_TOO_LONG);
        }

        let Self {
            ctx,
            out,
            session_id,
            level,
            recent_commands,
            terminal_output,
            ..
        } = &mut *self;
        let context = MentorContext {
            level: *level,
            recent_commands: recent_commands.as_slice(),
            terminal_output: terminal_output.as_str(),
        };

        write!(out, "Mentor: ")?;
        out.flush()?;
        let mut on_token = |token: &str| {
            let _ = out.write_all(token.as_bytes());
            let _ = out.flush();
        };
        ctx.mentor
            .respond(session_id.as_str(), message, &context, &mut on_token)
            .await;
        writeln!(self.out)?;
        self.drain_events()
    }

    fn switch_level(&mut self, level: u32) -> io::Result<()> {
        self.level = level;
        if self.ctx.sessions.session_exists(&self.session_id) {
            self.ctx
                .sessions
                .update_session(&self.session_id, SessionUpdate::level(level));
        }
        self.say(&format!("Switched to Level {}", level))?;
        let info = self.ctx.levels.format_level_info(level);
        self.say(info.trim_end())
    }

    fn show_history(&mut self) -> io::Result<()> {
        let commands = self.ctx.history.all_commands();
        if commands.is_empty() {
            return self.say("No commands in history");
        }
        // Stored newest first, listed oldest first
        for (i, command) in commands.iter().rev().enumerate() {
            writeln!(self.out, "{:>4}  {}", i + 1, command)?;
        }
        Ok(())
    }

    async fn resize(&mut self, cols: &str, rows: &str) -> io::Result<()> {
        let (Ok(cols), Ok(rows)) = (cols.parse::<u32>(), rows.parse::<u32>()) else {
            return self.say("Usage: :resize <cols> <rows>");
        };
        if cols == 0 || rows == 0 {
            return self.say("Usage: :resize <cols> <rows>");
        }
        let Some(session) = self.ctx.registry.get_connection(&self.session_id) else {
            return self.say(MSG_NOT_CONNECTED);
        };
        session.resize(cols, rows).await;
        self.drain_events()
    }

    async fn toggle_offline(&mut self) -> io::Result<()> {
        if self.offline {
            self.offline = false;
            return self.say("Offline mode disabled");
        }

        if self.ctx.registry.get_connection(&self.session_id).is_some() {
            self.ctx.registry.disconnect_session(&self.session_id).await;
            self.drain_events()?;
        }
        self.offline = true;
        self.say("Offline mode enabled")
    }

    fn show_output(&mut self, chunk: &str) -> io::Result<()> {
        self.out.write_all(chunk.as_bytes())?;
        self.out.flush()?;

        self.terminal_output.push_str(chunk);
        if self.terminal_output.len() > TERMINAL_BUFFER_LIMIT {
            let mut cut = self.terminal_output.len() - TERMINAL_BUFFER_LIMIT;
            while !self.terminal_output.is_char_boundary(cut) {
                cut += 1;
            }
            self.terminal_output.drain(..cut);
        }
        Ok(())
    }

    fn show_notice(&mut self, notice: &Notice) -> io::Result<()> {
        writeln!(self.out, "[{}] {}", notice.severity, notice.message)
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}", message)
    }
}

/// `bandit7` logs into level 7
fn level_from_username(username: &str) -> Option<u32> {
    username.strip_prefix("bandit")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::mentor::{ChatClient, ChatMessage, MentorError};
    use crate::ssh::testing::ScriptedConnector;
    use crate::ssh::SshError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    struct EchoClient;

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn stream_chat(
            &self,
            messages: &[ChatMessage],
            on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
        ) -> Result<String, MentorError> {
            let question = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            for token in ["You asked: ", question.as_str()] {
                on_token(token);
            }
            Ok(format!("You asked: {}", question))
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.ssh.host = "bandit.test".to_string();
        config.ssh.retries = 2;
        config.ssh.retry_backoff_ms = 5;
        config
    }

    fn console_with(
        connector: &Arc<ScriptedConnector>,
        chat: Option<Arc<dyn ChatClient>>,
    ) -> (Console<Vec<u8>>, TempDir) {
        let dir = tempdir().unwrap();
        let ctx = AppContext::from_parts(test_config(), dir.path(), connector.clone(), chat);
        (Console::new(ctx, Vec::new()), dir)
    }

    fn printed(console: &Console<Vec<u8>>) -> String {
        String::from_utf8_lossy(&console.out).into_owned()
    }

    async fn login(console: &mut Console<Vec<u8>>, username: &str) {
        console
            .handle_line(&format!(":connect {}", username))
            .await
            .unwrap();
        console.handle_line("secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_and_send_command() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);

        login(&mut console, "bandit3").await;
        let text = printed(&console);
        assert!(text.contains("Password for bandit3: "));
        assert!(text.contains(MSG_CONNECTED));
        assert_eq!(console.level(), 3);

        let saved = console.ctx.sessions.current_session().unwrap();
        assert_eq!(saved.username, "bandit3");
        assert_eq!(saved.port, 2220);
        assert_eq!(saved.level, 3);

        console.handle_line("ls -la").await.unwrap();
        assert_eq!(connector.probe(0).writes(), vec!["ls -la\n"]);
        assert_eq!(console.ctx.history.all_commands(), vec!["ls -la"]);
        assert_eq!(console.recent_commands, vec!["ls -la"]);

        console.shutdown().await.unwrap();
        assert_eq!(connector.probe(0).close_count(), 1);
    }

    #[tokio::test]
    async fn test_relayed_output_reaches_buffer() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);
        login(&mut console, "bandit0").await;

        connector.probe(0).push_output("readme\r\n");
        for _ in 0..200 {
            console.drain_events().unwrap();
            if console.terminal_output.contains("readme") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(console.terminal_output.contains("readme"));
        assert!(printed(&console).contains("readme\r\n"));

        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_login_reports_each_attempt() {
        let connector = Arc::new(ScriptedConnector::failing_with(|| {
            SshError::ConnectionFailed("connection refused".into())
        }));
        let (mut console, _dir) = console_with(&connector, None);

        login(&mut console, "bandit0").await;
        let text = printed(&console);
        assert!(text.contains(MSG_CONNECT_FAILED));
        assert!(text.contains("[error] Connection attempt 1/2"));
        assert!(text.contains("[error] Connection attempt 2/2"));
        assert!(console.ctx.sessions.current_session().is_none());

        console.handle_line("ls").await.unwrap();
        assert!(printed(&console).ends_with(&format!("{}\n", MSG_NOT_CONNECTED)));

        console.handle_line(":disconnect").await.unwrap();
        let text = printed(&console);
        assert!(text.ends_with(&format!("{}\n", MSG_NOT_CONNECTED)));
        assert!(!text.contains(MSG_DISCONNECTED));
    }

    #[tokio::test]
    async fn test_login_validation() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);

        console.handle_line(":connect").await.unwrap();
        console.handle_line(":connect bandit0 abc").await.unwrap();
        console.handle_line(":connect bandit0 70000").await.unwrap();
        console.handle_line(":connect bandit0").await.unwrap();
        console.handle_line("").await.unwrap();

        let text = printed(&console);
        assert_eq!(text.matches(MSG_MISSING_CREDENTIALS).count(), 2);
        assert!(text.contains(MSG_PORT_NOT_NUMBER));
        assert!(text.contains(MSG_PORT_RANGE));
        assert_eq!(connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_custom_port_is_used() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);

        console.handle_line(":connect bandit0 2221").await.unwrap();
        console.handle_line("pw").await.unwrap();
        let session = console.ctx.registry.get_connection("default").unwrap();
        assert_eq!(session.config().port, 2221);

        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_long_command_rejected() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);
        login(&mut console, "bandit0").await;

        console.handle_line(&"a".repeat(1001)).await.unwrap();
        console
            .handle_line(&format!(":ask {}", "b".repeat(1001)))
            .await
            .unwrap();

        let text = printed(&console);
        assert!(text.contains(MSG_COMMAND_TOO_LONG));
        assert!(text.contains(MSG_MESSAGE_TOO_LONG));
        assert!(connector.probe(0).writes().is_empty());

        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_offline_mode() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);
        login(&mut console, "bandit0").await;

        console.handle_line(":offline").await.unwrap();
        assert!(console.is_offline());
        assert_eq!(connector.probe(0).close_count(), 1);

        console.handle_line(":connect bandit1").await.unwrap();
        console.handle_line("cat readme").await.unwrap();
        console.handle_line(":ask help").await.unwrap();

        let text = printed(&console);
        assert!(text.contains("Offline mode enabled"));
        assert!(text.contains(MSG_OFFLINE_CONNECT));
        assert!(text.contains(MSG_OFFLINE_SEND));
        assert!(text.contains(MSG_OFFLINE_MENTOR));
        assert_eq!(connector.attempts(), 1);

        console.handle_line(":offline").await.unwrap();
        assert!(!console.is_offline());
        assert!(printed(&console).contains("Offline mode disabled"));
    }

    #[tokio::test]
    async fn test_level_navigation() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);
        let max = console.ctx.levels.max_level();

        console.handle_line(":prev").await.unwrap();
        assert!(printed(&console).contains(MSG_FIRST_LEVEL));

        console.handle_line(":next").await.unwrap();
        assert_eq!(console.level(), 1);
        assert!(printed(&console).contains("Switched to Level 1\n# Bandit Level 1"));

        console
            .handle_line(&format!(":level {}", max))
            .await
            .unwrap();
        console.handle_line(":next").await.unwrap();
        assert_eq!(console.level(), max);
        assert!(printed(&console).contains(MSG_LAST_LEVEL));

        console
            .handle_line(&format!(":level {}", max + 1))
            .await
            .unwrap();
        console.handle_line(":level x").await.unwrap();
        assert_eq!(console.level(), max);
        let text = printed(&console);
        assert!(text.contains(&format!("Level {} is not available", max + 1)));
        assert!(text.contains("Usage: :level <n>"));
    }

    #[tokio::test]
    async fn test_ask_streams_reply() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, Some(Arc::new(EchoClient)));

        console.handle_line(":ask what is ls?").await.unwrap();
        assert!(printed(&console).contains("Mentor: You asked: what is ls?\n"));
        assert_eq!(console.ctx.mentor.conversation("default").len(), 2);
    }

    #[tokio::test]
    async fn test_hint_explain_history() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);

        console.handle_line(":history").await.unwrap();
        console.handle_line(":hint").await.unwrap();
        console.handle_line(":explain cat").await.unwrap();
        console.handle_line(":explain").await.unwrap();

        let text = printed(&console);
        assert!(text.contains("No commands in history"));
        assert!(text.contains("Hint: "));
        assert!(text.contains("Usage: :explain <command>"));

        login(&mut console, "bandit0").await;
        console.handle_line("ls").await.unwrap();
        console.handle_line("cat readme").await.unwrap();
        console.handle_line(":history").await.unwrap();
        assert!(printed(&console).contains("   1  ls\n   2  cat readme\n"));

        console.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_resize_and_disconnect() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);

        console.handle_line(":resize 120 40").await.unwrap();
        assert!(printed(&console).contains(MSG_NOT_CONNECTED));

        login(&mut console, "bandit0").await;
        console.handle_line(":resize 120 40").await.unwrap();
        console.handle_line(":resize wide tall").await.unwrap();
        assert_eq!(connector.probe(0).resizes(), vec![(120, 40)]);
        assert!(printed(&console).contains("Usage: :resize <cols> <rows>"));

        console.handle_line(":disconnect").await.unwrap();
        assert!(printed(&console).contains(MSG_DISCONNECTED));
        assert_eq!(console.ctx.registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_quit() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (mut console, _dir) = console_with(&connector, None);

        assert_eq!(console.handle_line(":frobnicate").await.unwrap(), Flow::Continue);
        assert!(printed(&console).contains("Unknown command :frobnicate"));
        assert_eq!(console.handle_line(":quit").await.unwrap(), Flow::Quit);
    }

    #[tokio::test]
    async fn test_run_closes_sessions_at_end_of_input() {
        let connector = Arc::new(ScriptedConnector::succeeding());
        let (console, _dir) = console_with(&connector, None);

        let input = tokio::io::BufReader::new(&b":connect bandit0\npw\nls\n"[..]);
        let out = console.run(input).await.unwrap();

        let text = String::from_utf8_lossy(&out).into_owned();
        assert!(text.contains(MSG_CONNECTED));
        assert_eq!(connector.probe(0).writes(), vec!["ls\n"]);
        assert_eq!(connector.probe(0).close_count(), 1);
    }

    #[test]
    fn test_level_from_username() {
        assert_eq!(level_from_username("bandit12"), Some(12));
        assert_eq!(level_from_username("bandit"), None);
        assert_eq!(level_from_username("root"), None);
    }
}
