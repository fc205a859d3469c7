//! Command handlers, one module per top-level subcommand.

pub mod cache;
pub mod config_cmd;
pub mod watch;
