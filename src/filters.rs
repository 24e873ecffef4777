use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::types::SessionSummary;

// Pure, stateless helpers over aggregated session collections. Everything
// here takes `now` explicitly so tests stay deterministic.

/// Keep sessions at or above a capacity threshold (inclusive).
pub fn filter_by_threshold(sessions: Vec<SessionSummary>, threshold: f64) -> Vec<SessionSummary> {
    sessions
        .into_iter()
        .filter(|s| s.percentage >= threshold)
        .collect()
}

/// Keep sessions whose last activity falls within the given age
/// (inclusive at the boundary).
pub fn filter_active_within(
    sessions: Vec<SessionSummary>,
    age: Duration,
    now: DateTime<Utc>,
) -> Vec<SessionSummary> {
    let cutoff = now - age;
    sessions
        .into_iter()
        .filter(|s| s.last_activity >= cutoff)
        .collect()
}

/// The complement: keep sessions strictly older than the given age.
pub fn filter_older_than(
    sessions: Vec<SessionSummary>,
    age: Duration,
    now: DateTime<Utc>,
) -> Vec<SessionSummary> {
    let cutoff = now - age;
    sessions
        .into_iter()
        .filter(|s| s.last_activity < cutoff)
        .collect()
}

/// Sort by capacity percentage, highest first. Stable: ties keep their
/// input order.
pub fn sort_by_capacity(sessions: &mut [SessionSummary]) {
    sessions.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Humanize a timestamp relative to `now`: "just now", "Nm ago", "Nh ago",
/// "Nd ago", "Nw ago", "Nmo ago", "Ny ago". All bands use integer floor
/// division, never rounding.
pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - timestamp).num_seconds().max(0);
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{days}d ago");
    }
    let weeks = days / 7;
    if weeks < 4 {
        return format!("{weeks}w ago");
    }
    let months = days / 30;
    if months < 12 {
        return format!("{months}mo ago");
    }
    format!("{}y ago", days / 365)
}

/// Parse a duration string of the form `<integer><unit>` where unit is one
/// of m, h, d, w, mo, y (months ≈ 30 days, years ≈ 365 days). Invalid
/// input is a user mistake and raises immediately, naming the grammar;
/// values too large to represent get the same error rather than a panic.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    let grammar_error = || {
        anyhow::anyhow!(
            "invalid duration \"{input}\": expected <number><unit> with unit one of m, h, d, w, mo, y"
        )
    };

    let value: i64 = digits.parse().map_err(|_| grammar_error())?;

    let duration = match unit {
        "m" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        "w" => Duration::try_weeks(value),
        "mo" => value.checked_mul(30).and_then(Duration::try_days),
        "y" => value.checked_mul(365).and_then(Duration::try_days),
        _ => return Err(grammar_error()),
    };
    duration.ok_or_else(grammar_error)
}
