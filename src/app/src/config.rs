use std::env;
use std::path::PathBuf;

use chrono::Weekday;

/// Service configuration derived from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    /// Flat table file loaded once at startup.
    pub data: PathBuf,
    /// Weekday closing each weekly bar.
    pub anchor: Weekday,
    /// Default label shift for weekly bars, in days.
    pub offset: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            data: PathBuf::from("stocks.csv"),
            anchor: Weekday::Fri,
            offset: -4,
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env_str(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "unparseable value, using default");
            default
        }),
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: env_str("CHARTING_BIND").unwrap_or(defaults.bind),
            port: env_parse("CHARTING_PORT", defaults.port),
            data: env_str("CHARTING_DATA").map(PathBuf::from).unwrap_or(defaults.data),
            anchor: env_parse("CHARTING_ANCHOR", defaults.anchor),
            offset: env_parse("CHARTING_OFFSET", defaults.offset),
        }
    }
}
