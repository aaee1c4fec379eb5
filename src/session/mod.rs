//! Session Management Module
//!
//! Keyed registry of live transport sessions. One connection per id;
//! creating under an existing id replaces (and tears down) the old one.

mod registry;

pub use registry::SessionRegistry;
