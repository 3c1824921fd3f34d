//! Server configuration from environment variables.

use std::path::PathBuf;

use park_map_explore::DuplicatePolicy;
use thiserror::Error;

/// Errors from reading the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `PORT` is not a valid port number.
    #[error("Invalid PORT '{value}': expected a number between 0 and 65535")]
    InvalidPort {
        /// The rejected value.
        value: String,
    },

    /// `EXPLORE_DUPLICATES` is neither `dedupe` nor `preserve`.
    #[error("Invalid EXPLORE_DUPLICATES '{value}': expected 'dedupe' or 'preserve'")]
    InvalidDuplicatePolicy {
        /// The rejected value.
        value: String,
    },
}

/// Runtime configuration for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`, default `127.0.0.1`).
    pub bind_addr: String,
    /// Port to bind (`PORT`, default 8080).
    pub port: u16,
    /// Serve from this JSON catalog fixture instead of `PostGIS`
    /// (`CATALOG_FIXTURE`).
    pub catalog_fixture: Option<PathBuf>,
    /// Duplicate handling for explore queries (`EXPLORE_DUPLICATES`).
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            catalog_fixture: None,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// `DATABASE_URL` is read separately when the `PostGIS` connection is
    /// opened.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable or `None` when it is unset. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value })?,
            None => defaults.port,
        };

        let duplicate_policy = match get("EXPLORE_DUPLICATES") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidDuplicatePolicy { value })?,
            None => defaults.duplicate_policy,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            catalog_fixture: get("CATALOG_FIXTURE").map(PathBuf::from),
            duplicate_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "0.0.0.0"),
            ("PORT", "9000"),
            ("CATALOG_FIXTURE", "data/catalog.json"),
            ("EXPLORE_DUPLICATES", "preserve"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.catalog_fixture,
            Some(PathBuf::from("data/catalog.json"))
        );
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Preserve);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", ""), ("CATALOG_FIXTURE", " ")]))
            .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.catalog_fixture.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::InvalidPort { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("EXPLORE_DUPLICATES", "sometimes")])),
            Err(ConfigError::InvalidDuplicatePolicy { .. })
        ));
    }
}
