use chrono::{DateTime, Utc};

use crate::filters::format_relative_time;
use crate::types::{ArchiveResult, SessionSummary, Severity};
use crate::utils::{NumberFormatOptions, format_number};

// Plain-text presentation of the core's data structures. The core itself
// only produces plain strings and numbers; everything visual lives here.

const BAR_WIDTH: usize = 20;

pub fn capacity_bar(percentage: f64) -> String {
    let filled = ((percentage / 100.0) * BAR_WIDTH as f64).floor() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled)
    )
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Elevated => "🟡",
        Severity::Warning => "🟨",
        Severity::Ok => "🟢",
    }
}

fn place(session: &SessionSummary) -> String {
    let base = match &session.label {
        Some(label) => format!("{}/{}", session.channel, label),
        None => session.channel.clone(),
    };
    match &session.agent_name {
        Some(agent) => format!("{base} [{agent}]"),
        None => base,
    }
}

pub fn print_sessions_table(
    sessions: &[SessionSummary],
    options: &NumberFormatOptions,
    now: DateTime<Utc>,
) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }

    for session in sessions {
        let short_id: String = session.session_id.chars().take(8).collect();
        println!(
            "{} {} {:>6.1}%  {}  {} / {} tokens ({})  {}  {}",
            severity_marker(session.severity()),
            capacity_bar(session.percentage),
            session.percentage,
            place(session),
            format_number(session.tokens_used, options),
            format_number(session.tokens_max, options),
            session.model,
            format_relative_time(session.last_activity, now),
            short_id,
        );
    }
}

pub fn print_recommendations(lines: &[String]) {
    println!();
    println!("Recommendations:");
    for line in lines {
        println!("  • {line}");
    }
}

pub fn print_archive_result(result: &ArchiveResult) {
    let verb = if result.dry_run {
        "Would archive"
    } else {
        "Archived"
    };
    println!("{verb} {} session(s).", result.archived.len());
    for entry in &result.archived {
        println!("  {} → {}", entry.session_id, entry.to.display());
    }
    if !result.failed.is_empty() {
        println!("{} failure(s):", result.failed.len());
        for failure in &result.failed {
            println!("  {}: {}", failure.session_id, failure.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_is_fixed_width_and_clamped() {
        assert_eq!(capacity_bar(0.0).chars().count(), BAR_WIDTH + 2);
        assert_eq!(capacity_bar(100.0).chars().count(), BAR_WIDTH + 2);
        // Over-limit sessions still render a full bar, nothing more.
        assert_eq!(capacity_bar(125.0), capacity_bar(100.0));
        assert!(capacity_bar(50.0).contains("██████████░░░░░░░░░░"));
    }
}
