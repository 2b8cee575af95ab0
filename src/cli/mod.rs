//! CLI command handlers
//!
//! - Argument parsing structures
//! - Command implementations
//! - Routing from parsed arguments to commands

pub mod args;
pub mod commands;
pub mod router;

pub use args::{Cli, Commands};
pub use router::execute_command;
