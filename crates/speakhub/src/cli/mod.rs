//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the speakhub binary.

mod check;
mod commands;
mod inspect;
mod run;

pub use check::check_config;
pub use commands::{Cli, Commands, OutputFormat};
pub use inspect::inspect_store;
pub use run::{load_config, run_server};
