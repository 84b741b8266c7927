//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines (`LOG_FORMAT=json`)
    pub log_json: bool,
    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,
    /// Seed for the world RNG; random when unset
    pub world_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let world_seed = match lookup("WORLD_SEED") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber("WORLD_SEED"))?,
            ),
            None => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: matches!(lookup("LOG_FORMAT").as_deref(), Some("json")),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            world_seed,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} must be an unsigned integer")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.client_origin, "*");
        assert!(config.world_seed.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn json_log_format_is_opt_in() {
        let config = Config::from_lookup(lookup_from(&[("LOG_FORMAT", "json")])).unwrap();
        assert!(config.log_json);

        let config = Config::from_lookup(lookup_from(&[("LOG_FORMAT", "pretty")])).unwrap();
        assert!(!config.log_json);
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:7000"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("SERVER_ADDR", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress));

        let err = Config::from_lookup(lookup_from(&[("WORLD_SEED", "-4")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber("WORLD_SEED")));
    }

    #[test]
    fn seed_is_parsed() {
        let config = Config::from_lookup(lookup_from(&[("WORLD_SEED", " 42 ")])).unwrap();
        assert_eq!(config.world_seed, Some(42));
    }
}
