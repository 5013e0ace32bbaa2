//! Command-line interface for ad-forge.
//!
//! Provides commands for generating external functions, cleaning working
//! directories and inspecting model layouts.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
