use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::KafkaSourceConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Read from the environment, with a `.env` file loaded first when present.
// Unset variables take their defaults; set but unparsable ones are errors.
//
// ============================================================================

pub const DEFAULT_KAFKA_BROKERS: &str = "localhost:29092";
pub const DEFAULT_KAFKA_TOPIC: &str = "orders-topic";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub pg_dsn: String,
    pub pg_max_connections: u32,
    pub pg_acquire_timeout: Duration,
    pub kafka: KafkaSourceConfig,
    /// Socket address the API server binds, e.g. `0.0.0.0:8081`
    pub http_addr: String,
    pub metrics_port: u16,
    pub cache_capacity: usize,
    pub warmup_limit: usize,
    pub warmup_lookup_timeout: Duration,
    pub dlq_enabled: bool,
}

impl Config {
    /// Load configuration for the order service
    ///
    /// - PG_DSN (required)
    /// - PG_MAX_CONNECTIONS (default: 10)
    /// - PG_ACQUIRE_TIMEOUT_MS (default: 5000)
    /// - KAFKA_BROKERS (default: localhost:29092)
    /// - KAFKA_TOPIC (default: orders-topic)
    /// - KAFKA_GROUP_ID (default: order-service)
    /// - KAFKA_AUTO_OFFSET_RESET (default: latest)
    /// - KAFKA_POLL_TIMEOUT_MS (default: 500)
    /// - HTTP_ADDR (default: :8081)
    /// - METRICS_PORT (default: 9090)
    /// - CACHE_CAPACITY (default: 100)
    /// - WARMUP_LIMIT (default: 10)
    /// - WARMUP_LOOKUP_TIMEOUT_MS (default: 2000)
    /// - DLQ_ENABLED (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is not an error
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let pg_dsn = vars
            .get("PG_DSN")
            .filter(|dsn| !dsn.trim().is_empty())
            .ok_or(ConfigError::Missing("PG_DSN"))?;

        Ok(Self {
            pg_dsn,
            pg_max_connections: vars.parse_or("PG_MAX_CONNECTIONS", 10)?,
            pg_acquire_timeout: vars.millis_or("PG_ACQUIRE_TIMEOUT_MS", 5_000)?,
            kafka: KafkaSourceConfig {
                brokers: vars.string_or("KAFKA_BROKERS", DEFAULT_KAFKA_BROKERS),
                topic: vars.string_or("KAFKA_TOPIC", DEFAULT_KAFKA_TOPIC),
                group_id: vars.string_or("KAFKA_GROUP_ID", "order-service"),
                auto_offset_reset: vars.offset_reset()?,
                poll_timeout: vars.millis_or("KAFKA_POLL_TIMEOUT_MS", 500)?,
            },
            http_addr: listen_addr(&vars.string_or("HTTP_ADDR", ":8081")),
            metrics_port: vars.parse_or("METRICS_PORT", 9090)?,
            cache_capacity: vars.parse_or("CACHE_CAPACITY", 100)?,
            warmup_limit: vars.parse_or("WARMUP_LIMIT", 10)?,
            warmup_lookup_timeout: vars.millis_or("WARMUP_LOOKUP_TIMEOUT_MS", 2_000)?,
            dlq_enabled: vars.bool_or("DLQ_ENABLED", true)?,
        })
    }
}

/// Settings for the synthetic order emitter.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub brokers: String,
    pub topic: String,
    pub interval: Duration,
}

impl EmitterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        Ok(Self {
            brokers: vars.string_or("KAFKA_BROKERS", DEFAULT_KAFKA_BROKERS),
            topic: vars.string_or("KAFKA_TOPIC", DEFAULT_KAFKA_TOPIC),
            interval: vars.nonzero_millis_or("EMITTER_INTERVAL_MS", 1_000)?,
        })
    }
}

/// `:8081` style addresses listen on all interfaces.
fn listen_addr(raw: &str) -> String {
    match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    }
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        }
    }

    fn millis_or(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse_or(key, default).map(Duration::from_millis)
    }

    fn nonzero_millis_or(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        match self.millis_or(key, default)? {
            interval if interval.is_zero() => Err(ConfigError::Invalid {
                key,
                value: self.get(key).unwrap_or_default(),
            }),
            interval => Ok(interval),
        }
    }

    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { key, value }),
            },
        }
    }

    fn offset_reset(&self) -> Result<String, ConfigError> {
        let key = "KAFKA_AUTO_OFFSET_RESET";
        let value = self.string_or(key, "latest");
        match value.as_str() {
            "earliest" | "latest" => Ok(value),
            _ => Err(ConfigError::Invalid { key, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("PG_DSN", "postgres://localhost/orders")]).unwrap();

        assert_eq!(config.pg_dsn, "postgres://localhost/orders");
        assert_eq!(config.pg_max_connections, 10);
        assert_eq!(config.kafka.brokers, "localhost:29092");
        assert_eq!(config.kafka.topic, "orders-topic");
        assert_eq!(config.kafka.group_id, "order-service");
        assert_eq!(config.kafka.auto_offset_reset, "latest");
        assert_eq!(config.kafka.poll_timeout, Duration::from_millis(500));
        assert_eq!(config.http_addr, "0.0.0.0:8081");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.warmup_limit, 10);
        assert_eq!(config.warmup_lookup_timeout, Duration::from_secs(2));
        assert!(config.dlq_enabled);
    }

    #[test]
    fn test_dsn_is_required() {
        assert_eq!(config_from(&[]).unwrap_err(), ConfigError::Missing("PG_DSN"));
        assert_eq!(config_from(&[("PG_DSN", "  ")]).unwrap_err(), ConfigError::Missing("PG_DSN"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PG_DSN", "postgres://db/orders"),
            ("KAFKA_BROKERS", "k1:9092,k2:9092"),
            ("KAFKA_AUTO_OFFSET_RESET", "earliest"),
            ("HTTP_ADDR", "127.0.0.1:3000"),
            ("WARMUP_LIMIT", "0"),
            ("DLQ_ENABLED", "false"),
        ])
        .unwrap();

        assert_eq!(config.kafka.brokers, "k1:9092,k2:9092");
        assert_eq!(config.kafka.auto_offset_reset, "earliest");
        assert_eq!(config.http_addr, "127.0.0.1:3000");
        assert_eq!(config.warmup_limit, 0);
        assert!(!config.dlq_enabled);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = config_from(&[("PG_DSN", "postgres://db"), ("METRICS_PORT", "http")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "METRICS_PORT",
                value: "http".to_string()
            }
        );

        assert!(config_from(&[("PG_DSN", "postgres://db"), ("KAFKA_AUTO_OFFSET_RESET", "smallest")]).is_err());
        assert!(config_from(&[("PG_DSN", "postgres://db"), ("DLQ_ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn test_emitter_config() {
        let vars: HashMap<&str, &str> = [("EMITTER_INTERVAL_MS", "250")].into_iter().collect();
        let config = EmitterConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.brokers, DEFAULT_KAFKA_BROKERS);
        assert_eq!(config.topic, DEFAULT_KAFKA_TOPIC);
        assert_eq!(config.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_emitter_rejects_zero_interval() {
        let err = EmitterConfig::from_lookup(|key| (key == "EMITTER_INTERVAL_MS").then(|| "0".to_string())).unwrap_err();

        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "EMITTER_INTERVAL_MS",
                value: "0".to_string()
            }
        );
    }
}
