use serde::Serialize;

use crate::types::SessionSummary;

/// Which rule matched a session during identifier resolution. Rules are
/// tried in this order per session; the first hit wins for that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Label,
    Channel,
    ChannelLabel,
    DisplayName,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionMatch {
    pub session_id: String,
    pub channel: String,
    pub label: Option<String>,
    pub kind: MatchKind,
}

/// Result of resolving a user-supplied identifier. More than one match is
/// a first-class outcome, not an error: the resolver never guesses among
/// candidates, it hands the full list back for disambiguation.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub session_id: Option<String>,
    pub matches: Vec<SessionMatch>,
    pub ambiguous: bool,
    pub error: Option<String>,
}

impl Resolution {
    fn resolved(session_id: String, matches: Vec<SessionMatch>) -> Self {
        Self {
            session_id: Some(session_id),
            matches,
            ambiguous: false,
            error: None,
        }
    }
}

/// Leading 8-hex-digits-then-hyphen, i.e. a UUID or UUID prefix.
fn looks_like_uuid(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() > 8
        && bytes[..8].iter().all(u8::is_ascii_hexdigit)
        && bytes[8] == b'-'
}

/// Map a possibly ambiguous user string (UUID prefix, label, channel, or
/// "channel/label" combo) to exactly one session. Matching is
/// case-sensitive throughout — a deliberate simplification, not a bug.
pub fn resolve_session_id(input: &str, sessions: &[SessionSummary]) -> Resolution {
    // Well-formed-looking ids are trusted without a scan; the caller
    // confirms the file actually exists.
    if looks_like_uuid(input) {
        return Resolution::resolved(input.to_string(), Vec::new());
    }

    let mut matches = Vec::new();
    for session in sessions {
        let Some(kind) = match_session(input, session) else {
            continue;
        };
        matches.push(SessionMatch {
            session_id: session.session_id.clone(),
            channel: session.channel.clone(),
            label: session.label.clone(),
            kind,
        });
    }

    match matches.len() {
        0 => Resolution {
            session_id: None,
            matches,
            ambiguous: false,
            error: Some(format!("no sessions found matching \"{input}\"")),
        },
        1 => {
            let id = matches[0].session_id.clone();
            Resolution::resolved(id, matches)
        }
        _ => Resolution {
            session_id: None,
            matches,
            ambiguous: true,
            error: None,
        },
    }
}

fn match_session(input: &str, session: &SessionSummary) -> Option<MatchKind> {
    if session.label.as_deref() == Some(input) {
        return Some(MatchKind::Label);
    }
    if session.channel == input {
        return Some(MatchKind::Channel);
    }
    if let Some(label) = &session.label {
        let combo = format!("{}/{}", session.channel, label);
        if combo == input || combo.contains(input) {
            return Some(MatchKind::ChannelLabel);
        }
    }
    if let Some(display_name) = &session.display_name
        && display_name.contains(input)
    {
        return Some(MatchKind::DisplayName);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn session(id: &str, channel: &str, label: Option<&str>) -> SessionSummary {
        SessionSummary {
            session_id: id.to_string(),
            channel: channel.to_string(),
            label: label.map(str::to_string),
            model: "claude-sonnet-4-5".to_string(),
            tokens_used: 0,
            tokens_max: 200_000,
            percentage: 0.0,
            last_activity: Utc::now(),
            message_count: 1,
            agent_id: None,
            agent_name: None,
            session_dir: PathBuf::new(),
            path: PathBuf::new(),
            display_name: None,
        }
    }

    #[test]
    fn uuid_prefix_short_circuits() {
        let sessions = vec![session("a", "discord", None)];
        let res = resolve_session_id("1f2e3d4c-aaaa", &sessions);
        assert_eq!(res.session_id.as_deref(), Some("1f2e3d4c-aaaa"));
        assert!(!res.ambiguous);
        assert!(res.matches.is_empty());

        // Not hex, not a uuid: falls through to the scan.
        let res = resolve_session_id("notahexs-tring", &sessions);
        assert!(res.session_id.is_none());
    }

    #[test]
    fn channel_lookup_is_ambiguous_across_two_sessions() {
        let sessions = vec![
            session("id-1", "discord", Some("#navi-code-yatta")),
            session("id-2", "discord", Some("#general")),
        ];

        let res = resolve_session_id("discord", &sessions);
        assert!(res.ambiguous);
        assert!(res.session_id.is_none());
        assert_eq!(res.matches.len(), 2);
        assert!(res.matches.iter().all(|m| m.kind == MatchKind::Channel));

        let res = resolve_session_id("discord/#general", &sessions);
        assert!(!res.ambiguous);
        assert_eq!(res.session_id.as_deref(), Some("id-2"));
        assert_eq!(res.matches.len(), 1);
        assert_eq!(res.matches[0].kind, MatchKind::ChannelLabel);
    }

    #[test]
    fn exact_label_wins_over_other_rules() {
        let sessions = vec![
            session("id-1", "discord", Some("#navi-code-yatta")),
            session("id-2", "discord", Some("#general")),
        ];
        let res = resolve_session_id("#general", &sessions);
        assert!(!res.ambiguous);
        assert_eq!(res.session_id.as_deref(), Some("id-2"));
        assert_eq!(res.matches[0].kind, MatchKind::Label);
    }

    #[test]
    fn zero_matches_is_an_error_not_a_guess() {
        let sessions = vec![session("id-1", "discord", Some("#general"))];
        let res = resolve_session_id("slack", &sessions);
        assert!(res.session_id.is_none());
        assert!(!res.ambiguous);
        assert!(res.error.as_deref().unwrap().contains("no sessions found"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let sessions = vec![session("id-1", "discord", Some("#general"))];
        let res = resolve_session_id("Discord", &sessions);
        assert!(res.session_id.is_none());
        assert!(res.error.is_some());
    }

    #[test]
    fn display_name_substring_matches() {
        let mut s = session("id-1", "webchat", None);
        s.display_name = Some("Weekly planning sync".to_string());
        let res = resolve_session_id("planning", &[s]);
        assert_eq!(res.session_id.as_deref(), Some("id-1"));
        assert_eq!(res.matches[0].kind, MatchKind::DisplayName);
    }
}
