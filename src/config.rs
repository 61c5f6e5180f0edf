use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Default configuration constants
const DEFAULT_GEOCODING_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const DEFAULT_GEOCODING_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 1000;
const DEFAULT_ANTHROPIC_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_HANDSHAKE_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;

pub const GEOCODING_API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";
pub const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub geocoding: GeocodingConfig,
    pub anthropic: AnthropicConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocodingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub handshake_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub shutdown_timeout_seconds: u64,
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut settings = config::Config::builder();

        // Default values
        settings = settings
            .set_default("geocoding.base_url", DEFAULT_GEOCODING_BASE_URL)?
            .set_default("geocoding.timeout_seconds", DEFAULT_GEOCODING_TIMEOUT_SECONDS)?
            .set_default("anthropic.base_url", DEFAULT_ANTHROPIC_BASE_URL)?
            .set_default("anthropic.model", DEFAULT_ANTHROPIC_MODEL)?
            .set_default("anthropic.max_tokens", DEFAULT_ANTHROPIC_MAX_TOKENS)?
            .set_default("anthropic.timeout_seconds", DEFAULT_ANTHROPIC_TIMEOUT_SECONDS)?
            .set_default(
                "client.handshake_timeout_seconds",
                DEFAULT_HANDSHAKE_TIMEOUT_SECONDS,
            )?
            .set_default(
                "client.request_timeout_seconds",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )?
            .set_default(
                "client.shutdown_timeout_seconds",
                DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
            )?;

        // Load from config file if provided
        if let Some(path) = config_path
            && Path::new(path).exists()
        {
            settings = settings.add_source(config::File::with_name(path));
        }

        // Override with environment variables
        settings = settings.add_source(
            config::Environment::with_prefix("GEOCODER")
                .prefix_separator("_")
                .separator("__"),
        );

        // Well-known key variables win over everything else; blank values count as unset
        if let Some(key) = non_empty_var(GEOCODING_API_KEY_VAR) {
            settings = settings.set_override("geocoding.api_key", Some(key))?;
        }

        if let Some(key) = non_empty_var(ANTHROPIC_API_KEY_VAR) {
            settings = settings.set_override("anthropic.api_key", Some(key))?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Mask a secret for logs and diagnostics: first and last four characters only
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
