use crate::components::calendar_sync::window::MAX_WINDOW_DAYS;
use crate::error::{config_error, env_error, SyncResult};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::str::FromStr;

/// Default Google Calendar REST endpoint
pub const DEFAULT_GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
/// Default OAuth token endpoint used for refreshing access tokens
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Default Redis connection string
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
/// Where component toggles are persisted
pub const COMPONENTS_FILE: &str = "config/components.toml";
/// Longest accepted period between passes (one week)
pub const MAX_SYNC_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Main configuration structure for the sync service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google OAuth client ID
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Google Calendar ID the labs sync against
    pub google_calendar_id: String,
    /// Fixed access token; bypasses the Redis token store when set
    pub google_access_token: Option<String>,
    /// Base URL of the Calendar v3 API
    pub google_api_base: String,
    /// OAuth token endpoint
    pub google_token_url: String,
    /// Redis connection string
    pub redis_url: String,
    /// Timezone used to anchor all-day events
    pub timezone: String,
    /// Map of component names to their enabled status
    pub components: HashMap<String, bool>,
    /// Minutes between periodic reconciliation passes
    pub sync_interval_minutes: u64,
    /// Maximum number of events pushed per pass
    pub push_batch_size: usize,
    /// Days looked back by the periodic pull
    pub pull_lookback_days: i64,
    /// Days looked ahead by the periodic pull
    pub pull_lookahead_days: i64,
    /// Port the webhook server listens on
    pub webhook_port: u16,
    /// Shared secret expected in `X-Goog-Channel-Token`
    pub webhook_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_calendar_id: "primary".to_string(),
            google_access_token: None,
            google_api_base: DEFAULT_GOOGLE_API_BASE.to_string(),
            google_token_url: DEFAULT_GOOGLE_TOKEN_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            timezone: "UTC".to_string(),
            components: default_components(),
            sync_interval_minutes: 5,
            push_batch_size: 50,
            pull_lookback_days: 7,
            pull_lookahead_days: 30,
            webhook_port: 3000,
            webhook_token: None,
        }
    }
}

fn default_components() -> HashMap<String, bool> {
    let mut components = HashMap::new();
    components.insert("calendar_sync".to_string(), true);
    components.insert("webhook_server".to_string(), true);
    components
}

/// Read an optional variable and parse it, falling back to `default` when unset
fn parse_env<T: FromStr>(name: &str, default: T) -> SyncResult<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| config_error(&format!("Invalid {} value: {}", name, raw))),
        _ => Ok(default),
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> SyncResult<Self> {
        dotenv().ok();

        let defaults = Config::default();

        let google_client_id =
            env::var("GOOGLE_CLIENT_ID").map_err(|_| env_error("GOOGLE_CLIENT_ID"))?;
        let google_client_secret =
            env::var("GOOGLE_CLIENT_SECRET").map_err(|_| env_error("GOOGLE_CLIENT_SECRET"))?;
        let google_calendar_id =
            env::var("GOOGLE_CALENDAR_ID").map_err(|_| env_error("GOOGLE_CALENDAR_ID"))?;

        let timezone = env::var("TIMEZONE").unwrap_or(defaults.timezone);
        timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone: {}", timezone)))?;

        let mut components = defaults.components;
        if let Ok(content) = fs::read_to_string(COMPONENTS_FILE) {
            if let Ok(file_components) = toml::from_str::<HashMap<String, bool>>(&content) {
                for (key, value) in file_components {
                    components.insert(key, value);
                }
            }
        }

        let config = Config {
            google_client_id,
            google_client_secret,
            google_calendar_id,
            google_access_token: optional_env("GOOGLE_ACCESS_TOKEN"),
            google_api_base: env::var("GOOGLE_API_BASE").unwrap_or(defaults.google_api_base),
            google_token_url: env::var("GOOGLE_TOKEN_URL").unwrap_or(defaults.google_token_url),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            timezone,
            components,
            sync_interval_minutes: parse_env(
                "SYNC_INTERVAL_MINUTES",
                defaults.sync_interval_minutes,
            )?,
            push_batch_size: parse_env("PUSH_BATCH_SIZE", defaults.push_batch_size)?,
            pull_lookback_days: parse_env("PULL_LOOKBACK_DAYS", defaults.pull_lookback_days)?,
            pull_lookahead_days: parse_env("PULL_LOOKAHEAD_DAYS", defaults.pull_lookahead_days)?,
            webhook_port: parse_env("WEBHOOK_PORT", defaults.webhook_port)?,
            webhook_token: optional_env("WEBHOOK_TOKEN"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject tunables and component combinations the service cannot run with
    pub fn validate(&self) -> SyncResult<()> {
        if !(1..=MAX_SYNC_INTERVAL_MINUTES).contains(&self.sync_interval_minutes) {
            return Err(config_error(&format!(
                "SYNC_INTERVAL_MINUTES must be between 1 and {}",
                MAX_SYNC_INTERVAL_MINUTES
            )));
        }

        for (name, days) in [
            ("PULL_LOOKBACK_DAYS", self.pull_lookback_days),
            ("PULL_LOOKAHEAD_DAYS", self.pull_lookahead_days),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(config_error(&format!(
                    "{} must be between 0 and {}",
                    name, MAX_WINDOW_DAYS
                )));
            }
        }

        // The webhook server only forwards to the calendar sync actor
        let webhook = self.is_component_enabled("webhook_server");
        if webhook && !self.is_component_enabled("calendar_sync") {
            return Err(config_error("webhook_server requires calendar_sync to be enabled"));
        }

        Ok(())
    }

    /// Parsed timezone; falls back to UTC when the stored name is invalid
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    /// Check if a component is enabled
    pub fn is_component_enabled(&self, name: &str) -> bool {
        *self.components.get(name).unwrap_or(&false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sync_cadence() {
        let config = Config::default();
        assert_eq!(config.sync_interval_minutes, 5);
        assert_eq!(config.push_batch_size, 50);
        assert_eq!(config.pull_lookback_days, 7);
        assert_eq!(config.pull_lookahead_days, 30);
        assert!(config.is_component_enabled("calendar_sync"));
        assert!(config.is_component_enabled("webhook_server"));
        assert!(!config.is_component_enabled("unknown"));
    }

    #[test]
    fn test_tz_falls_back_to_utc() {
        let mut config = Config::default();
        config.timezone = "Europe/Helsinki".to_string();
        assert_eq!(config.tz(), chrono_tz::Europe::Helsinki);

        config.timezone = "Mars/Olympus".to_string();
        assert_eq!(config.tz(), chrono_tz::UTC);
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            sync_interval_minutes: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            sync_interval_minutes: u64::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            pull_lookback_days: i64::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            pull_lookahead_days: -1,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_webhook_without_calendar_sync() {
        let mut config = Config::default();
        config.components.insert("calendar_sync".to_string(), false);
        assert!(config.validate().is_err());

        config.components.insert("webhook_server".to_string(), false);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("LAB_SYNC_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
