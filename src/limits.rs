use phf::phf_map;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::debug_log;

/// Conservative fallback when nothing else matches: representative of
/// common mid-size context windows, avoiding both false low-capacity
/// alarms and silent under-warning on bigger models.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Well-known model families and their context windows. Checked by exact
/// key first, then substring match in either direction, so "claude-sonnet"
/// matches "vendor/claude-sonnet-4-5" and vice versa.
static KNOWN_LIMITS: phf::Map<&'static str, u64> = phf_map! {
    "claude-opus-4" => 200_000,
    "claude-sonnet-4" => 200_000,
    "claude-sonnet-4-5" => 200_000,
    "claude-haiku-4-5" => 200_000,
    "claude-3-5-sonnet" => 200_000,
    "claude-3-5-haiku" => 200_000,
    "gpt-4o" => 128_000,
    "gpt-4o-mini" => 128_000,
    "gpt-4.1" => 1_000_000,
    "gpt-5" => 400_000,
    "o3" => 200_000,
    "o4-mini" => 200_000,
    "gemini-2.5-pro" => 1_048_576,
    "gemini-2.5-flash" => 1_048_576,
    "gemini-2.0-flash" => 1_048_576,
    "deepseek-chat" => 128_000,
    "llama-3.3-70b" => 128_000,
};

/// Everything the limit resolver needs, threaded in explicitly so tests
/// can point every tier at fakes. No module-level state.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// Host runtime binary queried for its model table (tier 1).
    pub runtime_bin: String,
    /// Local model-provider config consulted when the runtime query fails
    /// (tier 2).
    pub models_config_path: PathBuf,
    /// Upper bound on the runtime query; a hung runtime must not stall the
    /// caller.
    pub timeout: Duration,
}

impl ResolverContext {
    pub fn new(runtime_bin: String, models_config_path: PathBuf, timeout_secs: u64) -> Self {
        Self {
            runtime_bin,
            models_config_path,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Resolve the context window for a model. Total: never fails, always
    /// returns a positive limit. Tiers are tried in order and each failure
    /// falls through silently.
    pub async fn resolve(&self, model: &str) -> u64 {
        if let Some(limit) = self.query_runtime(model).await {
            return limit;
        }
        if let Some(limit) = self.lookup_models_config(model) {
            return limit;
        }
        static_limit(model)
    }

    /// Tier 1: ask the host runtime for its model table and scan for a row
    /// mentioning this model. Any failure (binary missing, timeout, bad
    /// exit, no matching row) is swallowed and falls through.
    async fn query_runtime(&self, model: &str) -> Option<u64> {
        if model.is_empty() {
            return None;
        }

        let mut command = tokio::process::Command::new(&self.runtime_bin);
        command.args(["models", "list"]).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(_)) | Ok(Err(_)) => return None,
            Err(_) => {
                debug_log::log("LIMITS", "runtime_timeout", &self.runtime_bin);
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find(|line| line.contains(model))
            .and_then(extract_k_value)
    }

    /// Tier 2: search every provider's model list in the local models
    /// config for an id matching this model (exact or substring, either
    /// direction). Missing file, parse failure, or no match falls through.
    fn lookup_models_config(&self, model: &str) -> Option<u64> {
        if model.is_empty() {
            return None;
        }

        let content = std::fs::read_to_string(&self.models_config_path).ok()?;
        let config: ModelsConfig = serde_json::from_str(&content).ok()?;

        config
            .providers
            .values()
            .flat_map(|provider| provider.models.iter())
            .find(|entry| ids_match(&entry.id, model))
            .and_then(|entry| entry.context_window)
            .filter(|&limit| limit > 0)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ModelsConfig {
    #[serde(default)]
    providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderConfig {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    id: String,
    context_window: Option<u64>,
}

fn ids_match(candidate: &str, model: &str) -> bool {
    candidate == model || candidate.contains(model) || model.contains(candidate)
}

/// Pull a "<N>k" token out of a table row, e.g. "claude-sonnet-4-5  200k"
/// gives 200_000. Table borders and commas are trimmed off first.
fn extract_k_value(line: &str) -> Option<u64> {
    line.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .find_map(|token| {
            let digits = token.strip_suffix('k').or_else(|| token.strip_suffix('K'))?;
            digits.parse::<u64>().ok()
        })
        .map(|n| n * 1000)
        .filter(|&n| n > 0)
}

/// Tier 3: static table, exact first, then bidirectional substring.
fn static_limit(model: &str) -> u64 {
    if !model.is_empty() {
        if let Some(&limit) = KNOWN_LIMITS.get(model) {
            return limit;
        }
        for (known, &limit) in KNOWN_LIMITS.entries() {
            if ids_match(known, model) {
                return limit;
            }
        }
    }
    DEFAULT_CONTEXT_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Context whose first two tiers can never succeed, so resolution
    /// exercises the static table.
    fn offline_context() -> ResolverContext {
        ResolverContext::new(
            "capmon-test-no-such-binary".to_string(),
            PathBuf::from("/nonexistent/models.json"),
            1,
        )
    }

    #[tokio::test]
    async fn resolver_is_total() {
        let ctx = offline_context();
        for model in ["", "unknown", "claude-sonnet-4-5", "???", "gpt-4o"] {
            let limit = ctx.resolve(model).await;
            assert!(limit > 0, "resolve({model:?}) returned {limit}");
        }
    }

    #[tokio::test]
    async fn static_table_matches_substring_both_directions() {
        let ctx = offline_context();
        // Table key inside the queried id.
        assert_eq!(ctx.resolve("vendor/claude-sonnet-4-5-20250929").await, 200_000);
        // Queried id inside a table key.
        assert_eq!(ctx.resolve("gemini-2.5").await, 1_048_576);
        // Exact.
        assert_eq!(ctx.resolve("gpt-4o").await, 128_000);
        // Nothing matches: conservative default.
        assert_eq!(ctx.resolve("totally-unheard-of").await, DEFAULT_CONTEXT_WINDOW);
    }

    #[tokio::test]
    async fn models_config_tier_wins_over_static_table() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("models.json");
        std::fs::write(
            &config_path,
            r#"{"providers":{"acme":{"models":[
                {"id":"acme-large","contextWindow":512000},
                {"id":"gpt-4o","contextWindow":131072}
            ]}}}"#,
        )
        .unwrap();

        let ctx = ResolverContext::new(
            "capmon-test-no-such-binary".to_string(),
            config_path,
            1,
        );
        assert_eq!(ctx.resolve("acme-large").await, 512_000);
        // Config overrides the static table's 128_000.
        assert_eq!(ctx.resolve("gpt-4o").await, 131_072);
    }

    #[tokio::test]
    async fn malformed_models_config_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("models.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        let ctx = ResolverContext::new(
            "capmon-test-no-such-binary".to_string(),
            config_path,
            1,
        );
        assert_eq!(ctx.resolve("claude-sonnet-4-5").await, 200_000);
    }

    #[test]
    fn k_value_extraction() {
        assert_eq!(extract_k_value("claude-sonnet-4-5   200k   default"), Some(200_000));
        assert_eq!(extract_k_value("| gpt-4.1 | 1000K |"), Some(1_000_000));
        assert_eq!(extract_k_value("no sizes here"), None);
        assert_eq!(extract_k_value("kilos k 0k"), None);
    }
}
