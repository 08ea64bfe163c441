//! Error handling utilities for the CLI.
//!
//! The CLI reuses the core error type directly; this alias keeps command
//! signatures consistent with fetchmux-core.

use fetchmux_core::CoreResult;

/// Type alias for CLI results using CoreError.
pub type CliResult<T> = CoreResult<T>;
