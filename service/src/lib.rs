//! Process-level concerns shared by the implicit-flow binaries: command line
//! configuration and logging.

pub mod config;
pub mod logging;
