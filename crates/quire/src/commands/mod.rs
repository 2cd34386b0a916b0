//! Subcommand implementations.

pub mod build;
pub mod clean;
pub mod init;
pub mod options;
pub mod targets;
pub mod update;
pub mod watch;
