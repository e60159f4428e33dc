//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::game::lobby::MIN_MATCH_PLAYERS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS; any origin when empty
    pub client_origins: Vec<String>,
    /// Ready players needed to leave the lobby
    pub min_players: usize,
    /// Seed for spawns and powerups; random when unset
    pub match_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match get("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let client_origins = get("CLIENT_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let min_players = match get("MIN_PLAYERS") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= MIN_MATCH_PLAYERS)
                .ok_or(ConfigError::Invalid("MIN_PLAYERS"))?,
            None => MIN_MATCH_PLAYERS,
        };

        let match_seed = get("MATCH_SEED")
            .map(|raw| raw.parse::<u64>().map_err(|_| ConfigError::Invalid("MATCH_SEED")))
            .transpose()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origins,
            min_players,
            match_seed,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server_addr.port(), 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.client_origins.is_empty());
        assert_eq!(config.min_players, 2);
        assert_eq!(config.match_seed, None);
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let config = load(&[("CLIENT_ORIGIN", "http://a.test, http://b.test,")]).unwrap();
        assert_eq!(config.client_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            load(&[("MIN_PLAYERS", "0")]),
            Err(ConfigError::Invalid("MIN_PLAYERS"))
        ));
        assert!(matches!(
            load(&[("MIN_PLAYERS", "1")]),
            Err(ConfigError::Invalid("MIN_PLAYERS"))
        ));
        assert_eq!(load(&[("MIN_PLAYERS", "3")]).unwrap().min_players, 3);
        assert!(matches!(
            load(&[("MATCH_SEED", "abc")]),
            Err(ConfigError::Invalid("MATCH_SEED"))
        ));
        assert!(matches!(
            load(&[("SERVER_ADDR", "nope")]),
            Err(ConfigError::InvalidAddress)
        ));
        assert_eq!(load(&[("MATCH_SEED", "42")]).unwrap().match_seed, Some(42));
    }
}
