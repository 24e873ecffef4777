use std::collections::BTreeMap;

use crate::filters::sort_by_capacity;
use crate::types::{SessionSummary, Severity};

/// Derive human-readable suggested actions from an aggregated collection.
/// One suggestion per critical/high/elevated session, most urgent first,
/// plus at most one per agent pointing at that same agent's
/// lowest-capacity session under 50%. Work is never redirected across
/// agents. An empty finding set still yields one "all healthy" line so
/// callers can render the result without special-casing.
pub fn recommendations(sessions: &[SessionSummary]) -> Vec<String> {
    let mut out = Vec::new();

    let mut urgent: Vec<SessionSummary> = sessions
        .iter()
        .filter(|s| s.severity().needs_attention())
        .cloned()
        .collect();
    sort_by_capacity(&mut urgent);

    for session in &urgent {
        let action = match session.severity() {
            Severity::Critical => "archive it or start a fresh session now",
            Severity::High => "wrap up and hand off soon",
            _ => "keep an eye on it",
        };
        out.push(format!(
            "{} is at {:.1}% capacity ({}) — {}",
            describe(session),
            session.percentage,
            session.severity().as_str(),
            action,
        ));
    }

    // Agents holding a high-or-critical session get one pointer to their
    // own lowest-capacity session with room to spare. Same agent only:
    // another agent's sessions are not a valid destination for this
    // agent's work.
    let mut pressured: BTreeMap<&str, ()> = BTreeMap::new();
    for session in &urgent {
        if matches!(session.severity(), Severity::Critical | Severity::High) {
            pressured.insert(session.agent_key(), ());
        }
    }

    for agent_key in pressured.keys() {
        let target = sessions
            .iter()
            .filter(|s| s.agent_key() == *agent_key && s.percentage < 50.0)
            .min_by(|a, b| {
                a.percentage
                    .partial_cmp(&b.percentage)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(target) = target {
            out.push(format!(
                "agent {agent_key}: shift new work to {} ({:.1}%)",
                describe(target),
                target.percentage,
            ));
        }
    }

    if out.is_empty() {
        out.push("all sessions healthy — no action needed".to_string());
    }
    out
}

fn describe(session: &SessionSummary) -> String {
    let place = match &session.label {
        Some(label) => format!("{}/{}", session.channel, label),
        None => {
            let short: String = session.session_id.chars().take(8).collect();
            format!("{} session {short}", session.channel)
        }
    };
    match &session.agent_name {
        Some(agent) => format!("{place} [{agent}]"),
        None => place,
    }
}
