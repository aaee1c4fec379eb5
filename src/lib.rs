//! bandit-term - A terminal front-end for the Bandit SSH wargame
//!
//! One remote shell per session, relayed to a line console, with a level
//! catalog and an AI mentor alongside.

// Use mimalloc as the global allocator for better performance
// with high-frequency small allocations (relay chunks, SSE deltas)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod app;
pub mod config;
pub mod console;
pub mod level;
pub mod mentor;
pub mod session;
pub mod ssh;
pub mod state;

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging
///
/// With `to_file` the log goes to `<config dir>/logs/bandit-term-<date>.log`
/// so it does not interleave with the console. Falls back to stderr when the
/// file cannot be opened.
pub fn init_logging(to_file: bool) {
    if to_file {
        if let Some(file) = open_log_file() {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_log_file() -> Option<std::fs::File> {
    let log_dir = config::log_dir().ok()?;
    std::fs::create_dir_all(&log_dir).ok()?;

    let date = chrono::Local::now().format("%Y-%m-%d");
    let path = log_dir.join(format!("bandit-term-{}.log", date));
    OpenOptions::new().create(true).append(true).open(path).ok()
}
