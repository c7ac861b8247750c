//! Configuration management for the annotation engine and server

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::annotations::HighlightColor;
use crate::overlay::CLICK_THRESHOLD;

/// How long a clicked comment stays highlighted
pub const DEFAULT_PULSE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub database: DatabaseConfig,
    pub interaction: InteractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where the engine reaches the annotation API
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL; the client appends `/annotations`
    pub base_url: String,
    /// Optional bearer credential
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Tunables for pointer handling and drafting
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionConfig {
    /// Pointer-down/up pairs shorter than this count as clicks
    pub click_threshold: Duration,
    pub pulse_duration: Duration,
    pub default_color: HighlightColor,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                base_url: "http://localhost:3000/api".to_string(),
                api_token: None,
            },
            database: DatabaseConfig {
                url: "sqlite:./annotations.db".to_string(),
            },
            interaction: InteractionConfig::default(),
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_threshold: CLICK_THRESHOLD,
            pulse_duration: DEFAULT_PULSE,
            default_color: HighlightColor::default(),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let interaction = InteractionConfig {
            click_threshold: parse_millis(&lookup, "ANNOTATION_CLICK_THRESHOLD_MS")?
                .unwrap_or(defaults.interaction.click_threshold),
            pulse_duration: parse_millis(&lookup, "ANNOTATION_PULSE_MS")?
                .unwrap_or(defaults.interaction.pulse_duration),
            default_color: match lookup("ANNOTATION_DEFAULT_COLOR") {
                Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "ANNOTATION_DEFAULT_COLOR",
                    value,
                })?,
                None => defaults.interaction.default_color,
            },
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port: lookup("SERVER_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            store: StoreConfig {
                base_url: lookup("ANNOTATION_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.store.base_url),
                api_token: lookup("ANNOTATION_API_TOKEN").filter(|t| !t.is_empty()),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            interaction,
        })
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}
