//! Shared formatting helpers.

use chrono::{DateTime, Duration, TimeZone};
use std::path::{Path, PathBuf};

/// Placeholder rendered for a clock time that is not known yet.
pub const UNKNOWN_CLOCK_TIME: &str = "--:--";

/// Placeholder rendered for a duration that is not known yet.
pub const UNKNOWN_DURATION: &str = "--:--:--";

/// Format used for wall-clock times on the progress line.
pub const CLOCK_TIME_FORMAT: &str = "%H:%M";

/// Returns a user-safe, trimmed path string that can be used in logs and messages.
pub fn sanitize_user_path(path: &Path) -> String {
    path.display().to_string().trim().to_string()
}

/// Returns a normalized absolute path when it can be resolved, or the path as given.
pub fn canonical_or_relaxed(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Renders a wall-clock time as `HH:MM`, or the placeholder when unknown.
pub fn format_clock_time<Tz>(time: Option<&DateTime<Tz>>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match time {
        Some(time) => time.format(CLOCK_TIME_FORMAT).to_string(),
        None => UNKNOWN_CLOCK_TIME.to_string(),
    }
}

/// Renders a duration as `HH:MM:SS`, or the placeholder when unknown.
///
/// Hours are not wrapped at 24, so long estimates widen the field instead of
/// losing information. Negative durations clamp to zero.
pub fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return UNKNOWN_DURATION.to_string();
    };
    let secs = duration.num_seconds().max(0);
    let hours = secs / 3600;
    let rem_mins = (secs / 60) % 60;
    let rem_secs = secs % 60;
    format!("{hours:02}:{rem_mins:02}:{rem_secs:02}")
}

/// Human readable size rendering.
pub fn format_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut idx = 0usize;

    while value >= 1024.0 && idx < SUFFIXES.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }

    if idx == 0 {
        format!("{:.0} {}", value, SUFFIXES[idx])
    } else {
        format!("{:.1} {}", value, SUFFIXES[idx])
    }
}

/// Lower-cases an extension and strips a leading dot, so `".XSD"` and `"xsd"` compare equal.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}
