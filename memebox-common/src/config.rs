//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (passed in as [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing config file is not an error: the service logs a warning and
//! starts on defaults. A config file that exists but cannot be parsed is.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "MEMEBOX_CONFIG";
pub const DATA_FILE_ENV: &str = "MEMEBOX_DATA_FILE";
pub const BIND_ADDRESS_ENV: &str = "MEMEBOX_BIND_ADDRESS";
pub const PORT_ENV: &str = "PORT";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const VISION_API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";

const DEFAULT_DATA_FILE: &str = "data/memes.json";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

/// On-disk TOML configuration; every section is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path of the persisted catalog document
    pub data_file: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub openai: OpenAiConfig,
    pub vision: VisionConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "memebox_server=info,tower_http=debug".to_string(),
        }
    }
}

/// Description generator (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub requests_per_second: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4-vision-preview-1106".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 150,
            requests_per_second: 5,
        }
    }
}

/// Image analyzer (Google Cloud Vision REST)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub requests_per_second: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://vision.googleapis.com/v1".to_string(),
            requests_per_second: 5,
        }
    }
}

/// Lazy enrichment tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Maximum generator calls in flight within one batch
    pub max_concurrency: usize,
    /// Per-call timeout; a timed out call counts as a failure
    pub timeout_secs: u64,
    /// First backoff delay after a record's generation fails
    pub retry_base_ms: u64,
    /// Upper bound for the per-record backoff delay
    pub retry_max_ms: u64,
    /// Treat a present but blank description as missing
    pub regenerate_blank: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            timeout_secs: 30,
            retry_base_ms: 2_000,
            retry_max_ms: 300_000,
            regenerate_blank: false,
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_file: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_file: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub openai: OpenAiConfig,
    pub vision: VisionConfig,
    pub enrichment: EnrichmentConfig,
}

impl ServerConfig {
    /// Merge CLI overrides, environment and TOML into final settings
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let data_file = overrides
            .data_file
            .or_else(|| env_value(DATA_FILE_ENV).map(PathBuf::from))
            .or(toml.data_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));

        let bind_address = overrides
            .bind_address
            .or_else(|| env_value(BIND_ADDRESS_ENV))
            .or(toml.bind_address)
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match env_value(PORT_ENV) {
                Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                    Error::Config(format!("{} is not a valid port: {}", PORT_ENV, raw))
                })?,
                None => toml.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let mut openai = toml.openai;
        openai.api_key = env_value(OPENAI_API_KEY_ENV)
            .filter(|k| is_valid_key(k))
            .or(openai.api_key.filter(|k| is_valid_key(k)));

        let mut vision = toml.vision;
        vision.api_key = env_value(VISION_API_KEY_ENV)
            .filter(|k| is_valid_key(k))
            .or(vision.api_key.filter(|k| is_valid_key(k)));

        let enrichment = toml.enrichment;
        if enrichment.max_concurrency == 0 {
            return Err(Error::Config(
                "enrichment.max_concurrency must be at least 1".to_string(),
            ));
        }
        if enrichment.timeout_secs == 0 {
            return Err(Error::Config(
                "enrichment.timeout_secs must be at least 1".to_string(),
            ));
        }
        if enrichment.retry_max_ms < enrichment.retry_base_ms {
            return Err(Error::Config(
                "enrichment.retry_max_ms must not be below enrichment.retry_base_ms".to_string(),
            ));
        }

        Ok(Self {
            data_file,
            bind_address,
            port,
            log_level: toml.logging.level,
            openai,
            vision,
            enrichment,
        })
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Default per-user config file location (`<config_dir>/memebox/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("memebox").join("config.toml"))
}

/// Pick the config file to read: CLI path, then `MEMEBOX_CONFIG`, then the
/// per-user default if it exists
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    default_config_path().filter(|p| p.exists())
}

/// Load TOML configuration, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Config file not found: {} (using defaults)",
                path.display()
            );
            return Ok(TomlConfig::default());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}
