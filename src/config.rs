//! Configuration loading for the order service.
//!
//! The YAML file named by `CONFIG_PATH` is the only source. Every field is
//! required; values are checked by [`AppConfig::validate`] before use.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::api::HttpSettings;
use crate::messaging::ConsumerSettings;
use crate::storage::PgStoreOptions;
use crate::utils::RetryConfig;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub env: Environment,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub http_server: HttpServerConfig,
    pub ingest: IngestConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub workers: usize,
    pub ack_wait_ms: u64,
    pub redelivery_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpServerConfig {
    pub address: String,
    pub timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    pub probe_interval_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (set CONFIG_PATH)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    Ok(())
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be > 0"));
    }
    Ok(())
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingConfigPath)?;
        Self::from_path(Path::new(&path))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        require_text("database.host", &db.host)?;
        require_text("database.user", &db.user)?;
        require_text("database.dbname", &db.dbname)?;
        require_text("database.sslmode", &db.sslmode)?;
        if db.port == 0 {
            return Err(invalid("database.port", "must be > 0"));
        }
        if db.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be > 0"));
        }
        require_positive("database.acquire_timeout_ms", db.acquire_timeout_ms)?;

        let kafka = &self.kafka;
        require_text("kafka.brokers", &kafka.brokers)?;
        require_text("kafka.topic", &kafka.topic)?;
        require_text("kafka.group_id", &kafka.group_id)?;
        if kafka.workers == 0 {
            return Err(invalid("kafka.workers", "must be > 0"));
        }
        require_positive("kafka.ack_wait_ms", kafka.ack_wait_ms)?;
        require_positive("kafka.redelivery_delay_ms", kafka.redelivery_delay_ms)?;

        let http = &self.http_server;
        require_text("http_server.address", &http.address)?;
        require_positive("http_server.timeout_ms", http.timeout_ms)?;
        require_positive("http_server.idle_timeout_ms", http.idle_timeout_ms)?;

        let retry = &self.ingest.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("ingest.retry.max_attempts", "must be > 0"));
        }
        require_positive("ingest.retry.initial_delay_ms", retry.initial_delay_ms)?;
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(invalid("ingest.retry.max_delay_ms", "must be >= initial_delay_ms"));
        }
        if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
            return Err(invalid("ingest.retry.multiplier", "must be >= 1.0"));
        }

        require_positive("health.probe_interval_ms", self.health.probe_interval_ms)?;

        Ok(())
    }

    pub fn store_options(&self) -> PgStoreOptions {
        let db = &self.database;
        PgStoreOptions {
            host: db.host.clone(),
            port: db.port,
            user: db.user.clone(),
            password: db.password.clone(),
            dbname: db.dbname.clone(),
            sslmode: db.sslmode.clone(),
            max_connections: db.max_connections,
            acquire_timeout: Duration::from_millis(db.acquire_timeout_ms),
        }
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        let kafka = &self.kafka;
        ConsumerSettings {
            brokers: kafka.brokers.clone(),
            topic: kafka.topic.clone(),
            group_id: kafka.group_id.clone(),
            workers: kafka.workers,
            ack_wait: Duration::from_millis(kafka.ack_wait_ms),
            redelivery_delay: Duration::from_millis(kafka.redelivery_delay_ms),
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            address: self.http_server.address.clone(),
            request_timeout: Duration::from_millis(self.http_server.timeout_ms),
            idle_timeout: Duration::from_millis(self.http_server.idle_timeout_ms),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        let retry = &self.ingest.retry;
        RetryConfig {
            max_attempts: retry.max_attempts,
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            multiplier: retry.multiplier,
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.health.probe_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL_YAML: &str = r#"
env: local
database:
  host: localhost
  port: 5432
  user: orders
  password: secret
  dbname: orders
  sslmode: disable
  max_connections: 10
  acquire_timeout_ms: 5000
kafka:
  brokers: localhost:9092
  topic: Json-orders
  group_id: order-ingest
  workers: 4
  ack_wait_ms: 30000
  redelivery_delay_ms: 1000
http_server:
  address: 0.0.0.0:8080
  timeout_ms: 4000
  idle_timeout_ms: 60000
ingest:
  retry:
    max_attempts: 3
    initial_delay_ms: 100
    max_delay_ms: 2000
    multiplier: 2.0
health:
  probe_interval_ms: 10000
"#;

    #[test]
    fn test_parse_local_config() {
        let config = AppConfig::from_yaml(LOCAL_YAML).unwrap();

        assert_eq!(config.env, Environment::Local);
        assert_eq!(config.kafka.topic, "Json-orders");

        let consumer = config.consumer_settings();
        assert_eq!(consumer.workers, 4);
        assert_eq!(consumer.ack_wait, Duration::from_secs(30));

        let store = config.store_options();
        assert_eq!(store.port, 5432);
        assert_eq!(store.acquire_timeout, Duration::from_secs(5));

        let http = config.http_settings();
        assert_eq!(http.request_timeout, Duration::from_secs(4));

        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = LOCAL_YAML.replace("health:", "cache_size: 10\nhealth:");
        assert!(matches!(AppConfig::from_yaml(&yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_env_is_rejected() {
        let yaml = LOCAL_YAML.replace("env: local", "env: staging");
        assert!(matches!(AppConfig::from_yaml(&yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_workers_is_invalid() {
        let yaml = LOCAL_YAML.replace("workers: 4", "workers: 0");
        match AppConfig::from_yaml(&yaml) {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "kafka.workers"),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_topic_is_invalid() {
        let yaml = LOCAL_YAML.replace("topic: Json-orders", "topic: \"  \"");
        match AppConfig::from_yaml(&yaml) {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "kafka.topic"),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_bounds_are_checked() {
        let yaml = LOCAL_YAML.replace("max_delay_ms: 2000", "max_delay_ms: 50");
        match AppConfig::from_yaml(&yaml) {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "ingest.retry.max_delay_ms")
            }
            other => panic!("expected invalid value, got {:?}", other),
        }

        let yaml = LOCAL_YAML.replace("multiplier: 2.0", "multiplier: 0.5");
        assert!(matches!(
            AppConfig::from_yaml(&yaml),
            Err(ConfigError::InvalidValue { field: "ingest.retry.multiplier", .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AppConfig::from_path(Path::new("/nonexistent/order-service.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
