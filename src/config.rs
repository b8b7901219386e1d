//! Runtime configuration from the environment.
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file. Unparseable values fall back to their defaults.

use std::env;

use tracing::warn;

use crate::aggregation::DEFAULT_RECENT_LIMIT;
use crate::forwarder::{self, ForwarderConfig};
use crate::geo::IP_API_BASE;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 8080;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_PATH: &str = "sqlite:clickpath.db?mode=rwc";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Appended to redirects as `aff_id` when set.
    pub affiliate_id: Option<String>,
    pub geoip_enabled: bool,
    pub geoip_api_url: String,
    /// Set only when forwarding is enabled and fully configured.
    pub forwarder: Option<ForwarderConfig>,
    pub recent_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = get("CLICKPATH_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let database_url =
            get("CLICKPATH_DATABASE_URL").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let geoip_enabled = get("CLICKPATH_GEOIP_ENABLED")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);

        let geoip_api_url =
            get("CLICKPATH_GEOIP_API_URL").unwrap_or_else(|| IP_API_BASE.to_string());

        let forward_enabled = get("CLICKPATH_FORWARD_ENABLED")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        let forwarder = if forward_enabled {
            match (
                get("CLICKPATH_FORWARD_ACCESS_TOKEN"),
                get("CLICKPATH_FORWARD_PIXEL_ID"),
            ) {
                (Some(token), Some(pixel_id)) => {
                    let api_url = get("CLICKPATH_FORWARD_API_URL")
                        .unwrap_or_else(|| forwarder::DEFAULT_API_URL.to_string());
                    Some(ForwarderConfig::new(&api_url, &token, &pixel_id))
                }
                _ => {
                    warn!(
                        "Conversion forwarding enabled without access token and pixel ID, disabling"
                    );
                    None
                }
            }
        } else {
            None
        };

        let recent_limit = get("CLICKPATH_DASHBOARD_RECENT_LIMIT")
            .and_then(|v| v.parse().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_RECENT_LIMIT);

        Self {
            port,
            database_url,
            affiliate_id: get("CLICKPATH_AFFILIATE_ID"),
            geoip_enabled,
            geoip_api_url,
            forwarder,
            recent_limit,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DB_PATH);
        assert!(config.affiliate_id.is_none());
        assert!(config.geoip_enabled);
        assert_eq!(config.geoip_api_url, IP_API_BASE);
        assert!(config.forwarder.is_none());
        assert_eq!(config.recent_limit, 50);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CLICKPATH_PORT", "9090"),
            ("CLICKPATH_DATABASE_URL", "sqlite::memory:"),
            ("CLICKPATH_AFFILIATE_ID", "aff-7"),
            ("CLICKPATH_GEOIP_ENABLED", "false"),
            ("CLICKPATH_DASHBOARD_RECENT_LIMIT", "20"),
        ]);

        assert_eq!(config.port, 9090);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.affiliate_id.as_deref(), Some("aff-7"));
        assert!(!config.geoip_enabled);
        assert_eq!(config.recent_limit, 20);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("CLICKPATH_PORT", "http"),
            ("CLICKPATH_GEOIP_ENABLED", "maybe"),
            ("CLICKPATH_DASHBOARD_RECENT_LIMIT", "0"),
            ("CLICKPATH_AFFILIATE_ID", "  "),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.geoip_enabled);
        assert_eq!(config.recent_limit, 50);
        assert!(config.affiliate_id.is_none());
    }

    #[test]
    fn test_forwarding_requires_credentials() {
        let config = config_from(&[("CLICKPATH_FORWARD_ENABLED", "true")]);
        assert!(config.forwarder.is_none());

        let config = config_from(&[
            ("CLICKPATH_FORWARD_ENABLED", "true"),
            ("CLICKPATH_FORWARD_ACCESS_TOKEN", "secret"),
            ("CLICKPATH_FORWARD_PIXEL_ID", "123"),
        ]);
        let forwarder = config.forwarder.unwrap();
        assert_eq!(forwarder.pixel_id, "123");
        assert_eq!(forwarder.api_url, "https://graph.facebook.com/v13.0");

        let config = config_from(&[
            ("CLICKPATH_FORWARD_ACCESS_TOKEN", "secret"),
            ("CLICKPATH_FORWARD_PIXEL_ID", "123"),
        ]);
        assert!(config.forwarder.is_none());
    }
}
