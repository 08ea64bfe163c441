//! ETA estimation and the number formats used by the progress display.
//!
//! The estimator uses average throughput over the whole run. That lags on
//! bursty links, which is acceptable for a human-facing countdown.

use std::time::Duration;

/// Estimates time remaining from average throughput so far.
///
/// Returns `None` when the total size is unknown, nothing has been
/// downloaded yet, no time has elapsed, or the projection does not fit in
/// a `Duration`; callers display a sentinel instead.
#[must_use]
pub fn estimate_remaining(elapsed: Duration, downloaded: u64, total: Option<u64>) -> Option<Duration> {
    let total = total?;
    if downloaded == 0 || elapsed.is_zero() {
        return None;
    }

    let rate = downloaded as f64 / elapsed.as_secs_f64();
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }

    let remaining = total.saturating_sub(downloaded) as f64 / rate;
    // The total comes from an untrusted Content-Length header, so the
    // projection can exceed the representable range; that is no estimate,
    // not a panic.
    Duration::try_from_secs_f64(remaining).ok()
}

/// Formats a remaining-time estimate as `Xh Ym Zs`, omitting zero-valued
/// leading units. Seconds are always shown below one minute. `None` renders
/// as "unknown".
#[must_use]
pub fn format_eta(remaining: Option<Duration>) -> String {
    let Some(remaining) = remaining else {
        return "unknown".to_string();
    };

    let total_secs = remaining.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Formats a byte count as binary megabytes (bytes / 1024²) with two
/// decimals, without a unit suffix.
#[must_use]
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}
