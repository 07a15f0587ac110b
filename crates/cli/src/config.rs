use ecm_core::config::ConsoleConfig;
use ecm_core::error::{ConsoleError, ConsoleResult};
use ecm_core::session::expand_path;
use humantime::parse_duration;
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use tracing::debug;

const CONFIG_PATH: &str = "~/.ecm/config.toml";
const API_URL_ENV: &str = "ECM_API_URL";

/// `~/.ecm/config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigFile {
    api_url: Option<String>,
    /// Durations are humantime strings, e.g. "30s" or "1m".
    list_poll_interval: Option<String>,
    detail_poll_interval: Option<String>,
    terminate_grace: Option<String>,
    terminated_retention: Option<String>,
}

/// Defaults, overlaid by the config file, overlaid by `ECM_API_URL`.
pub fn load_config() -> ConsoleResult<ConsoleConfig> {
    let config_path = expand_path(CONFIG_PATH)?;
    let contents = if config_path.exists() {
        debug!("reading config from {}", config_path.display());
        fs::read_to_string(&config_path)
            .map_err(|e| ConsoleError::Config(format!("Failed to read {}: {}", config_path.display(), e)))?
    } else {
        String::new()
    };

    let mut config = parse_config(&contents)?;
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            config.api_url = url.trim().to_string();
        }
    }
    Ok(config)
}

pub fn parse_config(contents: &str) -> ConsoleResult<ConsoleConfig> {
    let file: ConfigFile = toml::from_str(contents)
        .map_err(|e| ConsoleError::Config(format!("Invalid config file: {}", e)))?;

    let mut config = ConsoleConfig::default();
    if let Some(url) = file.api_url {
        config.api_url = url;
    }
    if let Some(value) = &file.list_poll_interval {
        config.list_poll_interval = parse_interval("list-poll-interval", value)?;
    }
    if let Some(value) = &file.detail_poll_interval {
        config.detail_poll_interval = parse_interval("detail-poll-interval", value)?;
    }
    if let Some(value) = &file.terminate_grace {
        config.terminate_grace = parse_period("terminate-grace", value)?;
    }
    if let Some(value) = &file.terminated_retention {
        config.terminated_retention = parse_period("terminated-retention", value)?;
    }
    Ok(config)
}

fn parse_period(key: &str, value: &str) -> ConsoleResult<Duration> {
    parse_duration(value)
        .map_err(|e| ConsoleError::Config(format!("Invalid duration for {} '{}': {}", key, value, e)))
}

/// Poll intervals must be non-zero.
fn parse_interval(key: &str, value: &str) -> ConsoleResult<Duration> {
    let period = parse_period(key, value)?;
    if period.is_zero() {
        return Err(ConsoleError::Config(format!("{} must be greater than zero", key)));
    }
    Ok(period)
}
