use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::agents::default_base_dir;
use crate::limits::ResolverContext;
use crate::sessions::ScanContext;
use crate::utils::{NumberFormatOptions, warn_once};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub agents: AgentsConfig,
    pub display: DisplayConfig,
}

/// Where the host chat-agent runtime lives and how long we wait on it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RuntimeConfig {
    pub bin: String,
    pub base_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentsConfig {
    pub multi_agent: bool,
    pub excluded: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DisplayConfig {
    pub warn_threshold: f64,
    pub number_comma: bool,
    pub number_human: bool,
    pub locale: String,
    pub decimal_places: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig {
                bin: "openclaw".to_string(),
                base_dir: None,
                timeout_secs: 3,
            },
            agents: AgentsConfig {
                multi_agent: false,
                excluded: Vec::new(),
            },
            display: DisplayConfig {
                warn_threshold: 75.0,
                number_comma: true,
                number_human: false,
                locale: "en".to_string(),
                decimal_places: 1,
            },
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".capmon.toml"))
    }

    /// Load the config, falling back to defaults with a warning when the
    /// file exists but cannot be read or parsed. A broken config should
    /// degrade the tool to stock behavior, not hide the breakage.
    pub fn load_or_default() -> Config {
        match Self::load() {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn_once(format!("⚠️  Ignoring unreadable config: {e:#}"));
                Config::default()
            }
        }
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    pub fn base_dir(&self) -> PathBuf {
        self.runtime
            .base_dir
            .clone()
            .unwrap_or_else(default_base_dir)
    }

    /// Construct the scan context the aggregator and limit resolver run
    /// against. Built fresh per invocation; nothing is memoized across
    /// calls.
    pub fn scan_context(&self) -> ScanContext {
        let base_dir = self.base_dir();
        let resolver = ResolverContext::new(
            self.runtime.bin.clone(),
            base_dir.join("models.json"),
            self.runtime.timeout_secs,
        );
        ScanContext::new(base_dir, resolver)
    }

    pub fn format_options(&self) -> NumberFormatOptions {
        NumberFormatOptions {
            use_comma: self.display.number_comma,
            use_human: self.display.number_human,
            locale: self.display.locale.clone(),
            decimal_places: self.display.decimal_places,
        }
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 Edit it or use:");
        println!("   capmon config set <key> <value>");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("🔧 Current configuration:");
            println!("   Runtime Binary: {}", config.runtime.bin);
            println!("   Base Dir: {}", config.base_dir().display());
            println!("   Runtime Timeout: {}s", config.runtime.timeout_secs);
            println!("   Multi-Agent: {}", config.agents.multi_agent);
            println!("   Excluded Agents: {}", config.agents.excluded.join(", "));
            println!("   Warn Threshold: {}%", config.display.warn_threshold);
            println!("   Number Comma: {}", config.display.number_comma);
            println!("   Number Human: {}", config.display.number_human);
            println!("   Locale: {}", config.display.locale);
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'capmon config init' to create one.");
        }
    }
    Ok(())
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "runtime-bin" => config.runtime.bin = value.to_string(),
        "base-dir" => config.runtime.base_dir = Some(PathBuf::from(value)),
        "timeout-secs" => {
            config.runtime.timeout_secs = value
                .parse::<u64>()
                .context("Invalid number value. Use a whole number of seconds")?;
        }
        "multi-agent" => {
            config.agents.multi_agent = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        "excluded-agents" => {
            config.agents.excluded = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        "warn-threshold" => {
            let threshold = value
                .parse::<f64>()
                .context("Invalid number value. Use a percentage between 0 and 100")?;
            anyhow::ensure!(
                (0.0..=100.0).contains(&threshold),
                "Threshold out of range. Use a percentage between 0 and 100"
            );
            config.display.warn_threshold = threshold;
        }
        "number-comma" => {
            config.display.number_comma = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        "number-human" => {
            config.display.number_human = value
                .parse::<bool>()
                .context("Invalid boolean value. Use 'true' or 'false'")?;
        }
        "locale" => config.display.locale = value.to_string(),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}
