//! Library component of the fetchmux CLI application.
//!
//! The binary in main.rs stays thin; argument definitions, prompts,
//! terminal styling, and the command implementations live here so they
//! can be exercised by tests.

/// Command-line interface definitions using clap
pub mod cli;
/// Command implementations for each subcommand
pub mod commands;
/// Error handling utilities for the CLI
pub mod error;
/// Logging setup and helper functions
pub mod logging;
/// Interactive prompts for missing run inputs
pub mod prompts;
/// Terminal output styling
pub mod terminal;

// Re-exports for the binary and tests
pub use cli::{parse_cli, parse_cli_from, Cli, Commands, Container, DownloadArgs};
pub use commands::download::run_download;
pub use error::CliResult;
