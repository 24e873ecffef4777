use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::agents::{self, discover_agents};
use crate::debug_log;
use crate::limits::ResolverContext;
use crate::registry::Registry;
use crate::transcript::parse_transcript;
use crate::types::{Agent, SessionSummary, capacity_percentage};

/// Everything a scan needs, constructed once by the caller and threaded
/// through. Nothing here is cached across calls; every aggregation reads
/// fresh from disk.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub base_dir: PathBuf,
    pub agents_config_path: PathBuf,
    pub resolver: ResolverContext,
}

impl ScanContext {
    pub fn new(base_dir: PathBuf, resolver: ResolverContext) -> Self {
        Self {
            agents_config_path: base_dir.join("openclaw.json"),
            base_dir,
            resolver,
        }
    }
}

/// Aggregate session summaries across sources.
///
/// - An explicit directory bypasses agent discovery entirely and is
///   scanned as a single unlabeled source.
/// - With multi-agent mode off, only the default agent's directory is
///   scanned.
/// - Otherwise every discovered agent is scanned (minus exclusions) and
///   each summary is tagged with its agent. Duplicate session ids across
///   agents are kept as-is; the agent id disambiguates.
pub async fn get_all_sessions(
    ctx: &ScanContext,
    explicit_dir: Option<&Path>,
    multi_agent: bool,
    excluded_agents: &[String],
) -> Vec<SessionSummary> {
    if let Some(dir) = explicit_dir {
        return scan_directory(ctx, dir, None).await;
    }

    if !multi_agent {
        // Single-agent mode carries no agent tag; `agent_key()` supplies
        // the "main" sentinel where ownership grouping needs one.
        let agent = agents::main_agent(&ctx.base_dir);
        return scan_directory(ctx, &agent.sessions_dir, None).await;
    }

    let mut all = Vec::new();
    for agent in discover_agents(&ctx.agents_config_path, &ctx.base_dir) {
        if excluded_agents.iter().any(|id| id == &agent.id) {
            continue;
        }
        all.extend(scan_directory(ctx, &agent.sessions_dir, Some(&agent)).await);
    }
    all
}

/// Scan one session directory: every `*.jsonl` transcript is parsed, the
/// directory's registry applied, model limits resolved, and the summary
/// stamped with its true source directory. Unparseable files are skipped
/// silently; a missing directory yields an empty collection.
async fn scan_directory(
    ctx: &ScanContext,
    dir: &Path,
    agent: Option<&Agent>,
) -> Vec<SessionSummary> {
    let pattern = dir.join("*.jsonl");
    let paths: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
        Ok(entries) => entries.flatten().filter(|p| p.is_file()).collect(),
        Err(e) => {
            debug_log::log("SCAN", "bad_pattern", &format!("{}: {e}", dir.display()));
            Vec::new()
        }
    };

    let registry = Registry::load(dir);
    let now = Utc::now();
    // Limit lookups are memoized per scan invocation only; no state
    // survives the call.
    let mut limit_cache: HashMap<String, u64> = HashMap::new();

    let mut summaries = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(mut summary) = parse_transcript(&path, now) else {
            continue;
        };

        registry.apply(&mut summary);

        let tokens_max = match limit_cache.get(&summary.model) {
            Some(&limit) => limit,
            None => {
                let limit = ctx.resolver.resolve(&summary.model).await;
                limit_cache.insert(summary.model.clone(), limit);
                limit
            }
        };
        summary.tokens_max = tokens_max;
        summary.percentage = capacity_percentage(summary.tokens_used, tokens_max);

        // The summary's origin, not a caller-supplied default: archiving
        // relies on this in multi-agent batches.
        summary.session_dir = dir.to_path_buf();
        if let Some(agent) = agent {
            summary.agent_id = Some(agent.id.clone());
            summary.agent_name = Some(agent.name.clone());
        }

        summaries.push(summary);
    }

    debug_log::log(
        "SCAN",
        "directory_done",
        &format!("{}: {} sessions", dir.display(), summaries.len()),
    );
    summaries
}
