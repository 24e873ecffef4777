use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::types::SessionSummary;
use crate::utils::warn_once;

/// File name of the companion index kept next to the transcripts.
pub const REGISTRY_FILE: &str = "sessions.json";

#[derive(Debug, Clone, Default)]
pub struct RegistryEntry {
    pub channel: Option<String>,
    pub label: Option<String>,
    pub display_name: Option<String>,
}

/// Per-directory companion index mapping session id to channel/label
/// metadata. The registry is more reliable than the transcript's own
/// embedded fields, which go stale for historical records, so its values
/// override whatever the parser extracted.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
}

impl Registry {
    /// Load the index for one session directory. A missing file is normal
    /// (empty map); a malformed file is a warning, never an error.
    pub fn load(session_dir: &Path) -> Self {
        let path = session_dir.join(REGISTRY_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };

        let root: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn_once(format!(
                    "⚠️  Ignoring malformed session registry {}: {e}",
                    path.display()
                ));
                return Self::default();
            }
        };

        let mut entries = HashMap::new();
        if let Some(map) = root.as_object() {
            for (session_id, value) in map {
                entries.insert(session_id.clone(), parse_entry(value));
            }
        }

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Override a summary's channel/label/display name with registry
    /// values where present.
    pub fn apply(&self, summary: &mut SessionSummary) {
        let Some(entry) = self.entries.get(&summary.session_id) else {
            return;
        };
        if let Some(channel) = &entry.channel {
            summary.channel = channel.clone();
        }
        if let Some(label) = &entry.label {
            summary.label = Some(label.clone());
        }
        if let Some(display_name) = &entry.display_name {
            summary.display_name = Some(display_name.clone());
        }
    }
}

// Channel has appeared under several names across registry versions;
// first non-empty wins. Label has two.
fn parse_entry(value: &Value) -> RegistryEntry {
    RegistryEntry {
        channel: first_string(value, &["channel", "lastChannel", "origin"]),
        label: first_string(value, &["label", "groupChannel"]),
        display_name: first_string(value, &["displayName"]),
    }
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}
