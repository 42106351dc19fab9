use chrono::Duration;

/// Compact `1h2m03s` rendering. Negative durations, such as a file stamped
/// slightly in the future, show as zero.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds:02}s"),
        (0, _) => format!("{minutes}m{seconds:02}s"),
        _ => format!("{hours}h{minutes}m{seconds:02}s"),
    }
}
