//! Console input parsing and validation

/// Longest shell command or mentor message accepted
pub const MAX_INPUT_LEN: usize = 1000;

pub const MSG_MISSING_CREDENTIALS: &str = "Please enter both username and password";
pub const MSG_PORT_NOT_NUMBER: &str = "Port must be a valid number";
pub const MSG_PORT_RANGE: &str = "Port must be between 1 and 65535";
pub const MSG_NOT_CONNECTED: &str = "Not connected to SSH server";
pub const MSG_COMMAND_TOO_LONG: &str = "Command is too long (maximum 1000 characters)";
pub const MSG_MESSAGE_TOO_LONG: &str = "Message is too long (maximum 1000 characters)";
pub const MSG_FIRST_LEVEL: &str = "Already at the first level";
pub const MSG_LAST_LEVEL: &str = "Already at the last level";
pub const MSG_OFFLINE_CONNECT: &str = "Cannot connect in offline mode";
pub const MSG_OFFLINE_SEND: &str = "Cannot send commands in offline mode";
pub const MSG_OFFLINE_MENTOR: &str = "AI mentor is not available in offline mode";

pub const HELP: &str = "\
Commands:
  :connect <user> [port]  log in (password is asked next)
  :disconnect             close the SSH session
  :level <n>              show level n
  :next / :prev           move between levels
  :ask <message>          ask the AI mentor
  :hint                   hint for the current level
  :explain <command>      explain a Linux command
  :history                list previous commands
  :resize <cols> <rows>   resize the remote terminal
  :offline                toggle offline mode
  :help                   this text
  :quit                   exit
Anything else is sent to the remote shell.
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { username: String, port: Option<String> },
    Disconnect,
    Level(String),
    Next,
    Prev,
    Ask(String),
    Hint,
    Explain(String),
    History,
    Resize { cols: String, rows: String },
    Offline,
    Help,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    /// Text for the remote shell, without the trailing newline
    Shell(String),
    Empty,
}

/// Lines starting with `:` are console commands; everything else is shell input
pub fn parse(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Empty;
    }

    let Some(rest) = line.trim_start().strip_prefix(':') else {
        return Input::Shell(line.to_string());
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let mut words = args.split_whitespace();

    let command = match name {
        "connect" => Command::Connect {
            username: words.next().unwrap_or_default().to_string(),
            port: words.next().map(str::to_string),
        },
        "disconnect" => Command::Disconnect,
        "level" => Command::Level(args.to_string()),
        "next" => Command::Next,
        "prev" => Command::Prev,
        "ask" => Command::Ask(args.to_string()),
        "hint" => Command::Hint,
        "explain" => Command::Explain(args.to_string()),
        "history" => Command::History,
        "resize" => Command::Resize {
            cols: words.next().unwrap_or_default().to_string(),
            rows: words.next().unwrap_or_default().to_string(),
        },
        "offline" => Command::Offline,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Input::Command(command)
}

/// Empty means "use the configured port"
pub fn validate_port(raw: Option<&str>) -> Result<Option<u16>, &'static str> {
    let Some(raw) = raw.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let port: i64 = raw.parse().map_err(|_| MSG_PORT_NOT_NUMBER)?;
    if !(1..=65535).contains(&port) {
        return Err(MSG_PORT_RANGE);
    }
    Ok(Some(port as u16))
}

pub fn too_long(text: &str) -> bool {
    text.chars().count() > MAX_INPUT_LEN
}
