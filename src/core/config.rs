//! # Feature: Configuration System
//!
//! Bot configuration loaded from a YAML file with environment variable
//! interpolation, or from plain environment variables.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: YAML configuration with `${VAR:-default}` interpolation, settings storage and cache TTL
//! - 1.0.0: Initial environment variable configuration

use anyhow::{Context, Result};
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration for the bot process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Friendly name for logging
    #[serde(default = "default_name")]
    pub name: String,

    /// Discord bot token (required)
    pub discord_token: String,

    /// Dev mode guild ID (slash commands registered per guild for faster updates)
    #[serde(default)]
    pub discord_guild_id: Option<String>,

    /// Root directory of the settings files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How long a loaded settings record is served from memory
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Slash commands to register with Discord (empty/None = all commands)
    #[serde(default)]
    pub commands: Option<Vec<String>>,
}

// Default value functions for serde
fn default_name() -> String {
    "concierge".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BotConfig {
    /// Load configuration from a YAML file with environment variable interpolation
    ///
    /// Supports `${VAR_NAME}` syntax for environment variable substitution.
    /// Example: `discord_token: "${DISCORD_TOKEN}"`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let interpolated = interpolate_env_vars(&content)?;

        let config: BotConfig = serde_yaml::from_str(&interpolated)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        info!("Loaded config for '{}' from {}", config.name, path.display());
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = BotConfig {
            name: env::var("BOT_NAME").unwrap_or_else(|_| default_name()),
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN environment variable not set"))?,
            discord_guild_id: env::var("DISCORD_GUILD_ID").ok(),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
            cache_ttl_secs: match env::var("CACHE_TTL_SECS") {
                Ok(raw) => raw
                    .parse()
                    .with_context(|| format!("CACHE_TTL_SECS is not a number: {raw}"))?,
                Err(_) => default_cache_ttl_secs(),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            commands: None,
        };

        config.validate()?;
        Ok(config)
    }

    /// Auto-detect and load configuration
    ///
    /// Priority order:
    /// 1. If CONFIG_FILE env var is set, load from that file
    /// 2. If config.yaml exists in current directory, load from it
    /// 3. Fall back to environment variables
    pub fn auto_load() -> Result<Self> {
        if let Ok(config_path) = env::var("CONFIG_FILE") {
            info!("Loading config from CONFIG_FILE: {}", config_path);
            return Self::from_file(&config_path);
        }

        let default_config_path = "config.yaml";
        if Path::new(default_config_path).exists() {
            info!("Loading config from {}", default_config_path);
            return Self::from_file(default_config_path);
        }

        info!("No config file found, using environment variables");
        Self::from_env()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("name must not be empty");
        }
        if self.discord_token.is_empty() {
            anyhow::bail!("Bot '{}' has empty discord_token", self.name);
        }
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be at least 1");
        }
        self.dev_guild_id()?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Check if a slash command should be registered
    pub fn allows_command(&self, command_name: &str) -> bool {
        match &self.commands {
            None => true,
            Some(allowed) => allowed.iter().any(|c| c.eq_ignore_ascii_case(command_name)),
        }
    }

    /// Parsed dev mode guild, if configured
    pub fn dev_guild_id(&self) -> Result<Option<u64>> {
        self.discord_guild_id
            .as_deref()
            .map(|raw| {
                raw.parse::<u64>()
                    .with_context(|| format!("discord_guild_id is not a valid guild id: {raw}"))
            })
            .transpose()
    }
}

// ============================================================================
// Environment Variable Interpolation
// ============================================================================

/// Interpolate environment variables in a string
///
/// Supports `${VAR_NAME}` syntax. If a variable is not set, returns an error.
/// Use `${VAR_NAME:-default}` for default values.
fn interpolate_env_vars(content: &str) -> Result<String> {
    // Pattern: ${VAR_NAME} or ${VAR_NAME:-default}
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .context("Invalid interpolation pattern")?;

    let mut result = content.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default_value {
                Some(default) => default.to_string(),
                None => {
                    errors.push(format!("Environment variable '{}' is not set", var_name));
                    continue;
                }
            },
        };

        result = result.replace(full_match, &value);
    }

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variables:\n  - {}", errors.join("\n  - "));
    }

    Ok(result)
}

// ============================================================================
// Tests
// ============================================================================
