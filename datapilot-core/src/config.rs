use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::PilotError;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_STORE_PATH: &str = "datapilot_store.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecorationStyle {
    /// Icon placeholders resolved by the embedding page's icon set.
    #[default]
    Icons,
    /// Plain text glyphs, no icon set required.
    Glyphs,
}

impl std::str::FromStr for DecorationStyle {
    type Err = PilotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "icons" => Ok(DecorationStyle::Icons),
            "glyphs" => Ok(DecorationStyle::Glyphs),
            other => Err(PilotError::Config {
                message: format!("Unknown decoration style: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base: String,
    pub store_path: PathBuf,
    pub persist_datasets: bool,
    pub request_timeout: Duration,
    pub decoration: DecorationStyle,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            persist_datasets: false,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            decoration: DecorationStyle::default(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PilotError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PilotError::Config {
            message: format!("Invalid {}: {}", key, other),
        }),
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, PilotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PilotError> {
        let mut config = Self::default();

        if let Some(api_base) = lookup("DATAPILOT_API_BASE") {
            config.api_base = api_base;
        }
        if let Some(store_path) = lookup("DATAPILOT_STORE_PATH") {
            config.store_path = PathBuf::from(store_path);
        }
        if let Some(value) = lookup("DATAPILOT_PERSIST_DATASETS") {
            config.persist_datasets = parse_bool("DATAPILOT_PERSIST_DATASETS", &value)?;
        }
        if let Some(value) = lookup("DATAPILOT_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = value.trim().parse().map_err(|_| PilotError::Config {
                message: format!("Invalid DATAPILOT_REQUEST_TIMEOUT_SECS: {}", value),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = lookup("DATAPILOT_DECORATION") {
            config.decoration = value.parse()?;
        }

        info!("Configuration loaded:");
        info!("  API base: {}", config.api_base);
        info!("  Store path: {}", config.store_path.display());
        info!("  Persist datasets: {}", config.persist_datasets);
        info!("  Request timeout: {}s", config.request_timeout.as_secs());

        Ok(config)
    }
}
