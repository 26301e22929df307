// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;

use metric_batcher::constants::{DEFAULT_BATCH_SIZE, DEFAULT_INFLUXDB_HOST, DEFAULT_INFLUXDB_PORT};
use metric_batcher::influxdb::Credentials;
use metric_batcher::record::MalformedPolicy;

use crate::error::SinkInfluxdbError;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration of the sink, read from `INFLUX_*` environment variables
#[derive(Clone, PartialEq)]
pub struct Config {
    /// InfluxDB host name or address
    pub host: String,
    /// InfluxDB HTTP port
    pub port: u16,
    /// Target database, required
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Number of input lines per batch
    pub batch_size: u64,
    /// Retention policy to write into, empty for the database default
    pub retention_policy: String,
    /// What to do with lines whose value or timestamp does not parse
    pub malformed_policy: MalformedPolicy,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("batch_size", &self.batch_size)
            .field("retention_policy", &self.retention_policy)
            .field("malformed_policy", &self.malformed_policy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_INFLUXDB_HOST.to_string(),
            port: DEFAULT_INFLUXDB_PORT,
            database: String::new(),
            user: None,
            password: None,
            batch_size: DEFAULT_BATCH_SIZE,
            retention_policy: String::new(),
            malformed_policy: MalformedPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, SinkInfluxdbError> {
        let defaults = Self::default();

        let host = env::var("INFLUX_HOST").unwrap_or(defaults.host);
        let port = parse_var("INFLUX_PORT")?.unwrap_or(defaults.port);
        let database = env::var("INFLUX_DATABASE").unwrap_or_default();
        let user = env::var("INFLUX_USER").ok().filter(|user| !user.is_empty());
        let password = env::var("INFLUX_PASSWORD").ok();
        let batch_size = parse_var("INFLUX_BATCHSIZE")?.unwrap_or(defaults.batch_size);
        let retention_policy = env::var("INFLUX_RP").unwrap_or_default();
        let malformed_policy =
            parse_var("INFLUX_ON_MALFORMED")?.unwrap_or(defaults.malformed_policy);
        let log_level = env::var("INFLUX_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            host,
            port,
            database,
            user,
            password,
            batch_size,
            retention_policy,
            malformed_policy,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SinkInfluxdbError> {
        if self.host.trim().is_empty() {
            return Err(SinkInfluxdbError::InvalidConfig(
                "INFLUX_HOST cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(SinkInfluxdbError::InvalidConfig(
                "INFLUX_PORT must be greater than 0".to_string(),
            ));
        }

        if self.database.trim().is_empty() {
            return Err(SinkInfluxdbError::InvalidConfig(
                "INFLUX_DATABASE must be set".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(SinkInfluxdbError::InvalidConfig(
                "INFLUX_BATCHSIZE must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(SinkInfluxdbError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        self.user.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        })
    }
}

/// Reads and parses an optional variable; set but unparseable is an error.
fn parse_var<T>(name: &str) -> Result<Option<T>, SinkInfluxdbError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            SinkInfluxdbError::InvalidConfig(format!("{name}={raw:?} is invalid: {e}"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "INFLUX_HOST",
        "INFLUX_PORT",
        "INFLUX_DATABASE",
        "INFLUX_USER",
        "INFLUX_PASSWORD",
        "INFLUX_BATCHSIZE",
        "INFLUX_RP",
        "INFLUX_ON_MALFORMED",
        "INFLUX_LOG_LEVEL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn valid_config() -> Config {
        Config {
            database: "metrics".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_requires_database() {
        assert!(Config::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            port: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_host() {
        let config = Config {
            host: "  ".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let config = Config {
                log_level: level.to_string(),
                ..valid_config()
            };
            assert!(
                config.validate().is_ok(),
                "Log level '{}' should be valid",
                level
            );
        }
        let config = Config {
            log_level: "verbose".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_and_credentials() {
        let config = Config {
            host: "influx.local".to_string(),
            port: 9086,
            user: Some("root".to_string()),
            password: Some("root".to_string()),
            ..valid_config()
        };
        assert_eq!(config.base_url(), "http://influx.local:9086");
        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.username, "root");
        assert_eq!(credentials.password.as_deref(), Some("root"));

        assert!(valid_config().credentials().is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Config {
            user: Some("writer".to_string()),
            password: Some("hunter2".to_string()),
            ..valid_config()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("writer"));
        assert!(debug.contains("metrics"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        env::set_var("INFLUX_DATABASE", "metrics");

        let config = Config::from_env().unwrap();
        assert_eq!(config, valid_config());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("INFLUX_HOST", "db.internal");
        env::set_var("INFLUX_PORT", "8087");
        env::set_var("INFLUX_DATABASE", "telemetry");
        env::set_var("INFLUX_USER", "writer");
        env::set_var("INFLUX_PASSWORD", "secret");
        env::set_var("INFLUX_BATCHSIZE", "50");
        env::set_var("INFLUX_RP", "two_weeks");
        env::set_var("INFLUX_ON_MALFORMED", "skip");
        env::set_var("INFLUX_LOG_LEVEL", "DEBUG");

        let config = Config::from_env().unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 8087);
        assert_eq!(config.database, "telemetry");
        assert_eq!(config.user.as_deref(), Some("writer"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.retention_policy, "two_weeks");
        assert_eq!(config.malformed_policy, MalformedPolicy::Skip);
        assert_eq!(config.log_level, "debug");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_numbers() {
        clear_env();
        env::set_var("INFLUX_DATABASE", "metrics");
        env::set_var("INFLUX_BATCHSIZE", "lots");
        assert!(matches!(
            Config::from_env(),
            Err(SinkInfluxdbError::InvalidConfig(msg)) if msg.contains("INFLUX_BATCHSIZE")
        ));

        env::set_var("INFLUX_BATCHSIZE", "10");
        env::set_var("INFLUX_PORT", "70000");
        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_database() {
        clear_env();
        assert!(Config::from_env().is_err());
    }
}
