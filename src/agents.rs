use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::types::Agent;
use crate::utils::warn_once;

/// Synthetic identity used when the runtime config names no agents.
pub const MAIN_AGENT_ID: &str = "main";

/// Base directory of the host runtime (`~/.openclaw` unless overridden in
/// the capmon config).
pub fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".openclaw")
}

// Shape of the runtime's own config file, reduced to the part we consume.
#[derive(Debug, Default, Deserialize)]
struct RuntimeConfig {
    #[serde(default)]
    agents: AgentsSection,
}

#[derive(Debug, Default, Deserialize)]
struct AgentsSection {
    #[serde(default)]
    list: Vec<AgentEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentEntry {
    id: Option<String>,
    name: Option<String>,
    agent_dir: Option<PathBuf>,
}

/// Enumerate the agents configured for the host runtime. Never fails:
/// missing config, malformed config, or an empty agent list all fall back
/// to a single synthetic "main" agent under the base directory. Agents are
/// rediscovered fresh on every call.
pub fn discover_agents(config_path: &Path, base_dir: &Path) -> Vec<Agent> {
    let config = match std::fs::read_to_string(config_path) {
        Ok(content) => match serde_json::from_str::<RuntimeConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn_once(format!(
                    "⚠️  Ignoring malformed agent config {}: {e}",
                    config_path.display()
                ));
                RuntimeConfig::default()
            }
        },
        Err(_) => RuntimeConfig::default(),
    };

    let agents: Vec<Agent> = config
        .agents
        .list
        .into_iter()
        .filter_map(|entry| {
            let id = entry.id.filter(|id| !id.is_empty())?;
            let sessions_dir = resolve_sessions_dir(&id, entry.agent_dir.as_deref(), base_dir);
            Some(Agent {
                name: entry.name.unwrap_or_else(|| id.clone()),
                id,
                sessions_dir,
            })
        })
        .collect();

    if agents.is_empty() {
        return vec![main_agent(base_dir)];
    }
    agents
}

pub fn main_agent(base_dir: &Path) -> Agent {
    Agent {
        id: MAIN_AGENT_ID.to_string(),
        name: MAIN_AGENT_ID.to_string(),
        sessions_dir: resolve_sessions_dir(MAIN_AGENT_ID, None, base_dir),
    }
}

/// Pick the sessions directory for one agent. Candidates in order: the
/// configured agent dir + "sessions"; if the configured dir's final
/// component is "agent", its parent + "sessions"; the standard
/// `<base>/agents/<id>/sessions` path. The first candidate that exists
/// wins (symlinks resolved for stability); if none exist the standard path
/// is returned anyway so downstream code has a deterministic path to
/// report "not found" against.
fn resolve_sessions_dir(id: &str, agent_dir: Option<&Path>, base_dir: &Path) -> PathBuf {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = agent_dir {
        candidates.push(dir.join("sessions"));
        if dir.file_name().is_some_and(|name| name == "agent")
            && let Some(parent) = dir.parent()
        {
            candidates.push(parent.join("sessions"));
        }
    }
    candidates.push(base_dir.join("agents").join(id).join("sessions"));

    for candidate in &candidates {
        if candidate.is_dir() {
            return std::fs::canonicalize(candidate).unwrap_or_else(|_| candidate.clone());
        }
    }

    candidates.pop().unwrap_or_else(|| base_dir.join("sessions"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_main_agent() {
        let dir = tempfile::tempdir().unwrap();
        let agents = discover_agents(&dir.path().join("openclaw.json"), dir.path());
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, MAIN_AGENT_ID);
        assert_eq!(
            agents[0].sessions_dir,
            dir.path().join("agents").join("main").join("sessions")
        );
    }

    #[test]
    fn malformed_config_falls_back_to_main_agent() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("openclaw.json");
        std::fs::write(&config_path, "not json").unwrap();
        let agents = discover_agents(&config_path, dir.path());
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, MAIN_AGENT_ID);
    }

    #[test]
    fn empty_agent_list_falls_back_to_main_agent() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("openclaw.json");
        std::fs::write(&config_path, r#"{"agents":{"list":[]}}"#).unwrap();
        let agents = discover_agents(&config_path, dir.path());
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].id, MAIN_AGENT_ID);
    }

    #[test]
    fn configured_agents_are_listed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let kintaro_sessions = dir.path().join("work").join("kintaro").join("sessions");
        std::fs::create_dir_all(&kintaro_sessions).unwrap();

        let config_path = dir.path().join("openclaw.json");
        std::fs::write(
            &config_path,
            format!(
                r#"{{"agents":{{"list":[
                    {{"id":"kintaro","name":"Kintaro","agentDir":"{}"}},
                    {{"id":"motoko"}}
                ]}}}}"#,
                dir.path().join("work").join("kintaro").display()
            ),
        )
        .unwrap();

        let agents = discover_agents(&config_path, dir.path());
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, "kintaro");
        assert_eq!(agents[0].name, "Kintaro");
        // Configured dir + "sessions" exists, so it wins (canonicalized).
        assert_eq!(
            agents[0].sessions_dir,
            std::fs::canonicalize(&kintaro_sessions).unwrap()
        );
        // No configured dir and nothing on disk: standard path returned
        // anyway.
        assert_eq!(agents[1].name, "motoko");
        assert_eq!(
            agents[1].sessions_dir,
            dir.path().join("agents").join("motoko").join("sessions")
        );
    }

    #[test]
    fn agent_suffixed_dir_resolves_to_sibling_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("agents").join("kintaro");
        std::fs::create_dir_all(root.join("sessions")).unwrap();

        // Configured dir points at the agent state dir, not its root.
        let resolved = resolve_sessions_dir(
            "kintaro",
            Some(&root.join("agent")),
            dir.path(),
        );
        assert_eq!(
            resolved,
            std::fs::canonicalize(root.join("sessions")).unwrap()
        );
    }
}
