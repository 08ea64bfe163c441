//! Main entry point for the fetchmux command-line application.
//!
//! Parses arguments and dispatches to the command handlers; session setup
//! (prompts, logging, dependency checks) happens inside the commands.

use fetchmux_cli::cli::Commands;
use fetchmux_cli::{parse_cli, run_download, terminal};
use log::LevelFilter;
use std::process;

fn main() {
    let cli = parse_cli();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let result = match cli.command {
        Commands::Download(args) => run_download(args, log_level),
    };

    if let Err(error) = result {
        terminal::print_error(&error);
        process::exit(1);
    }
}
