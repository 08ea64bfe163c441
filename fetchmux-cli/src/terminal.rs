//! Terminal output styling for the CLI.
//!
//! Section headers and status lines are emitted through the `log` facade
//! so they also land in the run log file. Error reporting writes straight
//! to stderr because it must work before the logger is installed.

use fetchmux_core::CoreError;
use log::info;
use owo_colors::OwoColorize;
use unicode_width::UnicodeWidthStr;

/// Width that status labels are padded to, keeping values aligned.
const LABEL_WIDTH: usize = 15;

/// Checks whether colored output should be used on stderr.
pub fn should_use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
        && supports_color::on(supports_color::Stream::Stderr).is_some()
}

/// Prints a section header that groups the status lines below it.
pub fn print_section(title: &str) {
    info!("");
    if should_use_color() {
        info!("{}", format!("===== {} =====", title.to_uppercase()).cyan().bold());
    } else {
        info!("===== {} =====", title.to_uppercase());
    }
    info!("");
}

/// Prints an aligned label/value status line.
pub fn print_status(label: &str, value: &str, highlight: bool) {
    let labeled = format!("{label}:");
    // Pad by display width, not byte length.
    let pad = LABEL_WIDTH.saturating_sub(labeled.width());
    let padded = format!("{labeled}{}", " ".repeat(pad));
    if highlight && should_use_color() {
        info!("  {padded} {}", value.bold());
    } else {
        info!("  {padded} {value}");
    }
}

/// Prints a checkmarked success line.
pub fn print_success(message: &str) {
    if should_use_color() {
        info!("  {} {}", "✓".green().bold(), message);
    } else {
        info!("  ✓ {message}");
    }
}

/// Prints an error block to stderr with a suggestion when one applies.
pub fn print_error(error: &CoreError) {
    if should_use_color() {
        eprintln!("{} {}", "✗".red().bold(), "Download failed".red().bold());
    } else {
        eprintln!("✗ Download failed");
    }
    eprintln!("  Message: {error}");
    if let Some(suggestion) = suggestion_for(error) {
        eprintln!("  Suggestion: {suggestion}");
    }
}

fn suggestion_for(error: &CoreError) -> Option<&'static str> {
    match error {
        CoreError::DependencyNotFound(_) => {
            Some("Install the tool or point --ffmpeg/--ytdlp at its location.")
        }
        CoreError::ProbeFailed(_) => Some("Check that the URL is correct and reachable."),
        CoreError::NoMatchingVariant(_) => {
            Some("Run with --verbose to log the available formats.")
        }
        CoreError::MergerFailed(_) => {
            Some("Re-run with --verbose and check the run log for merger output.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestions_cover_user_facing_failures() {
        let e = CoreError::DependencyNotFound("ffmpeg".to_string());
        assert!(suggestion_for(&e).is_some());
        let e = CoreError::NoMatchingVariant("1080p".to_string());
        assert!(suggestion_for(&e).is_some());
        let e = CoreError::OperationFailed("misc".to_string());
        assert!(suggestion_for(&e).is_none());
    }
}
