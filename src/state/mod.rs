//! Local state persistence
//! Session metadata, command history and the file cache, all plain JSON files

pub mod cache;
pub mod history;
pub mod sessions;

pub use cache::{CacheError, FileCache};
pub use history::{CommandHistory, HistoryError};
pub use sessions::{SessionInfo, SessionStore, SessionStoreError, SessionUpdate};
