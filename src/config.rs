//! Runtime settings
//!
//! Sources, lowest priority first: built-in defaults, an optional
//! `vision-query.toml` in the working directory, then `VISION_QUERY_*`
//! environment variables. The API key falls back to `GROQ_API_KEY`.

use crate::error::ConfigError;
use crate::vision::models::VisionModel;
use ::config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const API_KEY_ENV: &str = "GROQ_API_KEY";
pub const ENV_PREFIX: &str = "VISION_QUERY";
pub const CONFIG_FILE: &str = "vision-query";

/// Settings as they appear in the file / environment
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    api_key: Option<String>,

    #[serde(default = "default_api_url")]
    api_url: String,

    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    max_tokens: u32,

    #[serde(default = "VisionModel::defaults")]
    models: Vec<VisionModel>,

    #[serde(default = "default_image_path")]
    image_path: PathBuf,

    #[serde(default = "default_query")]
    query: String,

    #[serde(default)]
    print_metrics: bool,
}

fn default_api_url() -> String { DEFAULT_API_URL.to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_tokens() -> u32 { 1000 }
fn default_image_path() -> PathBuf { PathBuf::from("cancer.jpg") }
fn default_query() -> String { "What is the disease in the picture ?".to_string() }

/// Validated settings
#[derive(Debug)]
pub struct Settings {
    /// Bearer token for the chat-completions endpoint
    pub api_key: SecretString,
    pub api_url: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Queried in order; answers are reported in the same order
    pub models: Vec<VisionModel>,
    /// Image used by the binary
    pub image_path: PathBuf,
    /// Query used by the binary
    pub query: String,
    /// Binary dumps the Prometheus text exposition to stderr after the query
    pub print_metrics: bool,
}

impl Settings {
    /// Defaults with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            models: VisionModel::defaults(),
            image_path: default_image_path(),
            query: default_query(),
            print_metrics: false,
        }
    }

    /// Load from `vision-query.toml` and the environment
    ///
    /// Call `dotenvy::dotenv()` beforehand to pick up a local `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Self::from_config(config, std::env::var(API_KEY_ENV).ok())
    }

    /// Build from an already assembled `config::Config`.
    ///
    /// `fallback_key` is used when the sources carry no `api_key`.
    pub fn from_config(config: Config, fallback_key: Option<String>) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.try_deserialize()?;

        let api_key = raw
            .api_key
            .or(fallback_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let settings = Self {
            api_key: SecretString::new(api_key),
            api_url: raw.api_url,
            timeout_secs: raw.timeout_secs,
            max_tokens: raw.max_tokens,
            models: raw.models,
            image_path: raw.image_path,
            query: raw.query,
            print_metrics: raw.print_metrics,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("at least one model is required".to_string()));
        }
        for (i, model) in self.models.iter().enumerate() {
            if self.models[..i].iter().any(|m| m.key == model.key) {
                return Err(ConfigError::Invalid(format!("duplicate model key {}", model.key)));
            }
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
