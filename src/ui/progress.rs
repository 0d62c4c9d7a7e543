//! Time formatting for summaries and history.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Format a timestamp relative to now (e.g. "2 hours ago").
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now().signed_duration_since(timestamp).num_seconds();

    if seconds < 60 {
        return "just now".to_string();
    }

    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    };

    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }

    let days = hours / 24;
    match days {
        1 => "yesterday".to_string(),
        2..=29 => plural(days, "day"),
        _ if days < 365 => plural(days / 30, "month"),
        _ => plural(days / 365, "year"),
    }
}

/// Format a duration for display.
///
/// Deploys and org test runs take minutes, so anything past a minute is
/// shown as minutes and seconds.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_time_just_now() {
        assert_eq!(format_relative_time(Utc::now()), "just now");
        assert_eq!(
            format_relative_time(Utc::now() + chrono::Duration::hours(1)),
            "just now"
        );
    }

    #[test]
    fn relative_time_minutes_and_hours() {
        let now = Utc::now();
        assert_eq!(
            format_relative_time(now - chrono::Duration::minutes(1)),
            "1 minute ago"
        );
        assert_eq!(
            format_relative_time(now - chrono::Duration::minutes(15)),
            "15 minutes ago"
        );
        assert_eq!(
            format_relative_time(now - chrono::Duration::hours(5)),
            "5 hours ago"
        );
    }

    #[test]
    fn relative_time_days_and_longer() {
        let now = Utc::now();
        assert_eq!(
            format_relative_time(now - chrono::Duration::days(1)),
            "yesterday"
        );
        assert_eq!(
            format_relative_time(now - chrono::Duration::days(5)),
            "5 days ago"
        );
        assert_eq!(
            format_relative_time(now - chrono::Duration::days(90)),
            "3 months ago"
        );
        assert_eq!(
            format_relative_time(now - chrono::Duration::days(400)),
            "1 year ago"
        );
    }

    #[test]
    fn format_duration_ranges() {
        assert_eq!(format_duration(Duration::ZERO), "0ms");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(5.3)), "5.3s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m");
    }
}
