//! Command implementations for the CLI subcommands.

/// The download command: fetch the chosen streams and merge them
pub mod download;
