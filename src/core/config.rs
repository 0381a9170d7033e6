//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.ara/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;

use crate::Provider;
use crate::core::persona::{ARA_INSTRUCTION, DEFAULT_TIMEZONE, Persona};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AraConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub max_duration_secs: Option<u64>,
    pub max_output_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RouteConfig {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    pub weather_delay_ms: Option<u64>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_DURATION_SECS: u64 = 30;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
pub const DEFAULT_OPENAI_BASE_URL: &str = crate::inference::providers::openai::DEFAULT_OPENAI_BASE_URL;
pub const DEFAULT_ROUTE_URL: &str = "http://localhost:3000/api/chat";
pub const DEFAULT_WEATHER_DELAY_MS: u64 = 2000;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: Provider,
    pub model_name: String,
    pub max_duration: Duration,
    pub max_output_tokens: u32,
    pub persona: Persona,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub route_url: String,
    pub weather_delay: Duration,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.ara`.
fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ara"))
}

/// Returns the path to `~/.ara/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.ara/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `AraConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<AraConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(AraConfig::default());
        }
    };
    load_config_from(&path)
}

/// Load config from an explicit path (same rules as [`load_config`]).
pub fn load_config_from(path: &Path) -> Result<AraConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(AraConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: AraConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Ara Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# provider = "openai"                # "openai" (direct, tools resolved locally) or "route"
# model = "gpt-4o"
# max_duration_secs = 30             # a response taking longer is treated as failed
# max_output_tokens = 4096
# timezone = "America/New_York"      # IANA name used for the clock line in the system prompt
# system_prompt = "You are named Ara."
# system_prompt_file = "persona.md"  # Path relative to ~/.ara/

# [openai]
# api_key = "sk-..."                 # Or set OPENAI_API_KEY env var
# base_url = "https://api.openai.com/v1"

# [route]
# url = "http://localhost:3000/api/chat"

# [tools]
# weather_delay_ms = 2000
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_provider` and `cli_model` come from CLI flags (None = not specified).
pub fn resolve(
    config: &AraConfig,
    cli_provider: Option<Provider>,
    cli_model: Option<&str>,
) -> ResolvedConfig {
    // Provider: CLI → env → config → default
    let provider = cli_provider
        .or_else(|| {
            std::env::var("ARA_PROVIDER")
                .ok()
                .and_then(|s| parse_provider(&s))
        })
        .or(config.general.provider)
        .unwrap_or_default();

    // Model: CLI → env → config → default
    let model_name = cli_model
        .map(|s| s.to_string())
        .or_else(|| std::env::var("ARA_MODEL").ok())
        .or_else(|| config.general.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    // OpenAI API key: env → config
    let openai_api_key = std::env::var("OPENAI_API_KEY")
        .ok()
        .or_else(|| config.openai.api_key.clone());

    let openai_base_url = std::env::var("OPENAI_BASE_URL")
        .ok()
        .or_else(|| config.openai.base_url.clone())
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

    let route_url = std::env::var("ARA_ROUTE_URL")
        .ok()
        .or_else(|| config.route.url.clone())
        .unwrap_or_else(|| DEFAULT_ROUTE_URL.to_string());

    ResolvedConfig {
        provider,
        model_name,
        max_duration: Duration::from_secs(
            config
                .general
                .max_duration_secs
                .unwrap_or(DEFAULT_MAX_DURATION_SECS),
        ),
        max_output_tokens: config
            .general
            .max_output_tokens
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        persona: Persona::new(resolve_instruction(config), resolve_timezone(config)),
        openai_api_key,
        openai_base_url,
        route_url,
        weather_delay: Duration::from_millis(
            config
                .tools
                .weather_delay_ms
                .unwrap_or(DEFAULT_WEATHER_DELAY_MS),
        ),
    }
}

fn parse_provider(s: &str) -> Option<Provider> {
    match s.to_ascii_lowercase().as_str() {
        "openai" => Some(Provider::OpenAi),
        "route" => Some(Provider::Route),
        other => {
            warn!("Ignoring unknown ARA_PROVIDER value '{}'", other);
            None
        }
    }
}

fn resolve_timezone(config: &AraConfig) -> Tz {
    match config.general.timezone.as_deref() {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|e| {
            warn!("Unknown timezone '{}' ({}), using {}", name, e, DEFAULT_TIMEZONE);
            DEFAULT_TIMEZONE
        }),
        None => DEFAULT_TIMEZONE,
    }
}

/// Resolves the persona instruction: inline wins over file, both win over default.
fn resolve_instruction(config: &AraConfig) -> String {
    if let Some(ref prompt) = config.general.system_prompt {
        return prompt.clone();
    }

    // Try loading from system_prompt_file (relative to ~/.ara/)
    if let Some(ref file) = config.general.system_prompt_file
        && let Some(dir) = config_dir()
    {
        let prompt_path = dir.join(file);
        match fs::read_to_string(&prompt_path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                if !trimmed.is_empty() {
                    info!("Loaded system prompt from {}", prompt_path.display());
                    return trimmed;
                }
                warn!("System prompt file is empty: {}", prompt_path.display());
            }
            Err(e) => {
                warn!(
                    "Failed to read system prompt file {}: {}",
                    prompt_path.display(),
                    e
                );
            }
        }
    }

    ARA_INSTRUCTION.to_string()
}
