//! Collaborator boundary: external command execution and the parsers that
//! turn its text output into typed records.

pub mod access_log;
pub mod auth_log;
pub mod listing;
pub mod runner;

pub use access_log::AccessLogParser;
pub use auth_log::AuthLogParser;
pub use listing::ListingParser;
pub use runner::{CachedRunner, CommandRunner, ShellRunner, StaticRunner};
