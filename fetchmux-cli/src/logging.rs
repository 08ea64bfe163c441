//! Logging setup for the CLI.
//!
//! Terminal output goes to stderr through the `log` facade so the
//! full-screen progress display owns stdout. When a log file is requested
//! the same messages are appended there with timestamps and ANSI color
//! codes stripped.

use log::LevelFilter;
use std::path::Path;

/// Returns a timestamp string for constructing log file names.
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Initializes the global logger with a stderr sink and an optional file sink.
///
/// Must be called at most once per process; fern rejects a second apply.
pub fn setup_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .level(level)
        // HTTP internals are too chatty at debug level.
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(
            fern::Dispatch::new()
                .format(|out, message, record| match record.level() {
                    // Info lines are pre-styled terminal output.
                    log::Level::Info => out.finish(format_args!("{message}")),
                    level => out.finish(format_args!("{level}: {message}")),
                })
                .chain(std::io::stderr()),
        );

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    let clean = strip_ansi_escapes::strip_str(message.to_string());
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        clean
                    ))
                })
                .chain(fern::log_file(path)?),
        );
    }

    dispatch.apply()?;
    Ok(())
}
