use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One chat session as derived from its transcript file plus the
/// per-directory registry. This is the unit everything downstream
/// (filtering, resolution, archiving, recommendations) operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub channel: String,
    pub label: Option<String>,
    pub model: String,
    pub tokens_used: u64,
    pub tokens_max: u64,
    pub percentage: f64,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// The directory this session's transcript was read from. Set once at
    /// parse time and never recomputed from a default; archiving groups by
    /// this field so multi-agent batches land under their own agent dirs.
    pub session_dir: PathBuf,
    /// Path to the transcript file itself.
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl SessionSummary {
    /// Agent identity used for ownership grouping; sessions scanned without
    /// multi-agent tagging all belong to the synthetic "main" agent.
    pub fn agent_key(&self) -> &str {
        self.agent_id
            .as_deref()
            .unwrap_or(crate::agents::MAIN_AGENT_ID)
    }

    pub fn severity(&self) -> Severity {
        Severity::classify(self.percentage)
    }
}

/// Capacity percentage rounded to one decimal place. A zero limit yields
/// 0.0 rather than dividing; usage above the limit is not clamped.
pub fn capacity_percentage(tokens_used: u64, tokens_max: u64) -> f64 {
    if tokens_max == 0 {
        return 0.0;
    }
    let raw = tokens_used as f64 / tokens_max as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// A named collection of sessions rooted at its own directory. Constructed
/// fresh on every discovery call; never cached across invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub sessions_dir: PathBuf,
}

/// Severity band for a session's capacity percentage. Band edges are
/// inclusive on the lower side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Warning,
    Elevated,
    High,
    Critical,
}

impl Severity {
    pub fn classify(percentage: f64) -> Self {
        if percentage >= 95.0 {
            Severity::Critical
        } else if percentage >= 90.0 {
            Severity::High
        } else if percentage >= 85.0 {
            Severity::Elevated
        } else if percentage >= 75.0 {
            Severity::Warning
        } else {
            Severity::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Elevated => "elevated",
            Severity::Warning => "warning",
            Severity::Ok => "ok",
        }
    }

    /// True for the bands that warrant a recommendation on their own.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            Severity::Critical | Severity::High | Severity::Elevated
        )
    }
}

/// Outcome of one archive batch. Per-item results: a failed move never
/// aborts the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveResult {
    pub archived: Vec<ArchivedSession>,
    pub failed: Vec<ArchiveFailure>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub session_id: String,
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveFailure {
    pub session_id: String,
    pub reason: String,
}
