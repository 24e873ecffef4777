use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::debug_log;
use crate::registry::REGISTRY_FILE;
use crate::types::{ArchiveFailure, ArchiveResult, ArchivedSession, SessionSummary};
use crate::utils::warn_once;

/// Move sessions into `<sessionDir>/archive/<YYYY-MM-DD>/`, grouped by each
/// session's own source directory. The grouping is what keeps multi-agent
/// batches correct: sessions from different agents archived in one call
/// each land under their own agent's directory, never all under one.
///
/// Every item's outcome is independent; the batch always returns a
/// structured result and never aborts on a per-session failure. With
/// `dry_run` set the filesystem is not touched at all.
pub fn archive_sessions(
    sessions: &[SessionSummary],
    fallback_dir: Option<&Path>,
    dry_run: bool,
) -> ArchiveResult {
    let mut result = ArchiveResult {
        archived: Vec::new(),
        failed: Vec::new(),
        dry_run,
    };

    let date = Local::now().format("%Y-%m-%d").to_string();

    // BTreeMap for deterministic group order across runs.
    let mut groups: BTreeMap<PathBuf, Vec<&SessionSummary>> = BTreeMap::new();
    for session in sessions {
        let dir = if session.session_dir.as_os_str().is_empty() {
            // Should not happen post-aggregation; kept as a guard for
            // callers constructing summaries by hand.
            fallback_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(default_sessions_dir)
        } else {
            session.session_dir.clone()
        };
        groups.entry(dir).or_default().push(session);
    }

    for (dir, group) in groups {
        let archive_dir = dir.join("archive").join(&date);

        if !dry_run && let Err(e) = std::fs::create_dir_all(&archive_dir) {
            // Permissions problems take down this directory's group only;
            // other groups proceed.
            for session in group {
                result.failed.push(ArchiveFailure {
                    session_id: session.session_id.clone(),
                    reason: format!("cannot create {}: {e}", archive_dir.display()),
                });
            }
            continue;
        }

        let mut archived_ids = Vec::new();
        for session in group {
            let source = transcript_path(session, &dir);
            let file_name = source
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| format!("{}.jsonl", session.session_id).into());
            let dest = archive_dir.join(file_name);

            if !source.is_file() {
                result.failed.push(ArchiveFailure {
                    session_id: session.session_id.clone(),
                    reason: "file not found".to_string(),
                });
                continue;
            }

            if dry_run {
                result.archived.push(ArchivedSession {
                    session_id: session.session_id.clone(),
                    from: source,
                    to: dest,
                });
                continue;
            }

            // Atomic within a volume; a concurrently vanished file shows
            // up here as a per-item failure, not a crash.
            match std::fs::rename(&source, &dest) {
                Ok(()) => {
                    debug_log::log("ARCHIVE", "moved", &dest.to_string_lossy());
                    archived_ids.push(session.session_id.clone());
                    result.archived.push(ArchivedSession {
                        session_id: session.session_id.clone(),
                        from: source,
                        to: dest,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    result.failed.push(ArchiveFailure {
                        session_id: session.session_id.clone(),
                        reason: "file not found".to_string(),
                    });
                }
                Err(e) => {
                    result.failed.push(ArchiveFailure {
                        session_id: session.session_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !dry_run && !archived_ids.is_empty() {
            prune_registry(&dir, &archived_ids);
        }
    }

    result
}

fn transcript_path(session: &SessionSummary, dir: &Path) -> PathBuf {
    if session.path.as_os_str().is_empty() {
        dir.join(format!("{}.jsonl", session.session_id))
    } else {
        session.path.clone()
    }
}

fn default_sessions_dir() -> PathBuf {
    crate::agents::default_base_dir()
        .join("agents")
        .join(crate::agents::MAIN_AGENT_ID)
        .join("sessions")
}

/// Drop archived ids from the directory's companion registry. The
/// registry is a convenience index, not the source of truth for file
/// existence, so failures here are warnings and never fail the archive.
fn prune_registry(dir: &Path, archived_ids: &[String]) {
    let path = dir.join(REGISTRY_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return,
    };

    let mut root: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn_once(format!(
                "⚠️  Could not update session registry {}: {e}",
                path.display()
            ));
            return;
        }
    };

    let Some(map) = root.as_object_mut() else {
        return;
    };
    let before = map.len();
    for id in archived_ids {
        map.remove(id);
    }
    if map.len() == before {
        return;
    }

    match serde_json::to_string_pretty(&root) {
        Ok(serialized) => {
            if let Err(e) = std::fs::write(&path, serialized) {
                warn_once(format!(
                    "⚠️  Could not update session registry {}: {e}",
                    path.display()
                ));
            }
        }
        Err(e) => warn_once(format!(
            "⚠️  Could not update session registry {}: {e}",
            path.display()
        )),
    }
}
