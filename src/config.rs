//! Run configuration.
//!
//! Loaded from `~/.meetledger/config.json` when present, with environment
//! variables layered on top. The env names are kept from the original
//! deployment (`DAYS_BACK`, `DEFAULT_HOURLY_RATE`, ...) so existing `.env`
//! setups keep working. The billing API key is env-only and never written to
//! the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extract::DEFAULT_PROXIMITY_WINDOW;
use crate::identity::DEFAULT_IDENTITY_LENGTH;

/// Environment variable holding the billing-system secret key.
pub const STRIPE_KEY_ENV: &str = "STRIPE_SECRET_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Hourly rate for customers with no rate of their own.
    #[serde(default = "default_hourly_rate")]
    pub default_hourly_rate: f64,

    /// Lookback window for calendar events, in days.
    #[serde(default = "default_days_back")]
    pub days_back: i64,

    /// Whether events matching no customer are surfaced for manual
    /// assignment.
    #[serde(default)]
    pub include_unassociated: bool,

    /// Currency code for emitted line items.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Max distance, in characters, between a customer's name and email in an
    /// event description for the proximity detection channel.
    #[serde(default = "default_proximity_window")]
    pub proximity_window_chars: usize,

    /// Truncation length of meeting identifiers, in hex characters. Changing
    /// this orphans the status of previously invoiced meetings.
    #[serde(default = "default_identity_length")]
    pub identity_length: usize,
}

fn default_hourly_rate() -> f64 {
    250.0
}

fn default_days_back() -> i64 {
    7
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_proximity_window() -> usize {
    DEFAULT_PROXIMITY_WINDOW
}

fn default_identity_length() -> usize {
    DEFAULT_IDENTITY_LENGTH
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_hourly_rate: default_hourly_rate(),
            days_back: default_days_back(),
            include_unassociated: false,
            currency: default_currency(),
            proximity_window_chars: default_proximity_window(),
            identity_length: default_identity_length(),
        }
    }
}

/// Path to the config file: `~/.meetledger/config.json`.
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".meetledger")
        .join("config.json")
}

/// Load configuration: file (if present), then env overrides.
///
/// A malformed file is logged and ignored rather than aborting the run.
pub fn load_config() -> Config {
    let mut config = load_config_file(&config_path()).unwrap_or_default();
    apply_env_overrides(&mut config);
    config
}

fn load_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("ignoring malformed config at {}: {e}", path.display());
                None
            }
        },
        Err(e) => {
            log::warn!("could not read config at {}: {e}", path.display());
            None
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(days) = env_parse::<i64>("DAYS_BACK") {
        config.days_back = days;
    }
    if let Some(rate) = env_parse::<f64>("DEFAULT_HOURLY_RATE") {
        config.default_hourly_rate = rate;
    }
    if let Ok(raw) = std::env::var("INCLUDE_UNASSOCIATED") {
        config.include_unassociated = matches!(raw.trim(), "1" | "true" | "yes");
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("ignoring unparseable {name}={raw:?}");
                None
            }
        },
        Err(_) => None,
    }
}

/// The billing API key, from the environment only.
pub fn stripe_api_key() -> Option<String> {
    std::env::var(STRIPE_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
