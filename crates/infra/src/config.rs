//! Configuration loading and engine wiring.
//!
//! Addresses are taken from the environment and handed to the drivers as-is;
//! the ledger only parses them.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use crate::ledger::{CallContext, InMemoryBackend, InventoryBackend, PostgresBackend};

pub const BACKEND_VAR: &str = "STOCKLEDGER_BACKEND";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS_VAR: &str = "DATABASE_MAX_CONNECTIONS";
pub const REDIS_URL_VAR: &str = "REDIS_URL";
pub const EVENT_CHANNEL_VAR: &str = "STOCKLEDGER_EVENT_CHANNEL";
pub const CALL_TIMEOUT_VAR: &str = "STOCKLEDGER_CALL_TIMEOUT_MS";

pub const DEFAULT_EVENT_CHANNEL: &str = "stockledger:inventory-transactions";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("{0} is set but this build has no support for it")]
    Unsupported(&'static str),
}

/// Which engine serves the backend contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub backend: BackendKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub redis_url: Option<String>,
    pub event_channel: String,
    pub call_timeout: Option<Duration>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            redis_url: None,
            event_channel: DEFAULT_EVENT_CHANNEL.to_string(),
            call_timeout: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let backend = match get(BACKEND_VAR).as_deref().map(str::trim) {
            None => BackendKind::Memory,
            Some(v) if v.eq_ignore_ascii_case("memory") => BackendKind::Memory,
            Some(v) if v.eq_ignore_ascii_case("postgres") => BackendKind::Postgres,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: BACKEND_VAR,
                    value: other.to_string(),
                });
            }
        };

        let database_url = get(DATABASE_URL_VAR);
        if backend == BackendKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing(DATABASE_URL_VAR));
        }

        let max_connections = match get(DATABASE_MAX_CONNECTIONS_VAR) {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(v) => parse_positive(DATABASE_MAX_CONNECTIONS_VAR, &v)?,
        };

        let call_timeout = get(CALL_TIMEOUT_VAR)
            .map(|v| parse_positive::<u64>(CALL_TIMEOUT_VAR, &v).map(Duration::from_millis))
            .transpose()?;

        Ok(Self {
            backend,
            database_url,
            max_connections,
            redis_url: get(REDIS_URL_VAR),
            event_channel: get(EVENT_CHANNEL_VAR)
                .unwrap_or_else(|| DEFAULT_EVENT_CHANNEL.to_string()),
            call_timeout,
        })
    }

    /// A fresh context carrying the configured per-call deadline, if any.
    pub fn call_context(&self) -> CallContext {
        match self.call_timeout {
            Some(timeout) => CallContext::with_timeout(timeout),
            None => CallContext::background(),
        }
    }
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

/// Construct the configured engine, wrapped in the publish-after-commit
/// adapter when a message bus address is configured.
pub async fn connect(config: &LedgerConfig) -> Result<Arc<dyn InventoryBackend>, ConfigError> {
    let engine: Arc<dyn InventoryBackend> = match config.backend {
        BackendKind::Memory => Arc::new(InMemoryBackend::new()),
        BackendKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?;
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
                .map_err(|e| ConfigError::Connect(e.to_string()))?;
            let backend = PostgresBackend::new(pool);
            backend
                .ensure_schema()
                .await
                .map_err(|e| ConfigError::Connect(e.to_string()))?;
            Arc::new(backend)
        }
    };
    info!(backend = ?config.backend, "inventory ledger engine ready");

    match config.redis_url.as_deref() {
        None => Ok(engine),
        Some(url) => with_publisher(engine, url, &config.event_channel),
    }
}

#[cfg(feature = "redis")]
fn with_publisher(
    engine: Arc<dyn InventoryBackend>,
    redis_url: &str,
    channel: &str,
) -> Result<Arc<dyn InventoryBackend>, ConfigError> {
    use crate::event_bus::RedisPubSubEventBus;
    use crate::ledger::PublishingBackend;

    let bus = RedisPubSubEventBus::new(redis_url, channel)
        .map_err(|e| ConfigError::Connect(e.to_string()))?;
    info!(channel, "publishing inventory transactions to redis");
    Ok(Arc::new(PublishingBackend::new(engine, bus)))
}

#[cfg(not(feature = "redis"))]
fn with_publisher(
    _engine: Arc<dyn InventoryBackend>,
    _redis_url: &str,
    _channel: &str,
) -> Result<Arc<dyn InventoryBackend>, ConfigError> {
    Err(ConfigError::Unsupported(REDIS_URL_VAR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| vars.get(var).cloned()
    }

    #[test]
    fn empty_environment_selects_in_memory_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.event_channel, "stockledger:inventory-transactions");
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = LedgerConfig::from_lookup(lookup(&[(BACKEND_VAR, "postgres")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(DATABASE_URL_VAR));
    }

    #[test]
    fn full_postgres_configuration_is_parsed() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (BACKEND_VAR, "Postgres"),
            (DATABASE_URL_VAR, "postgres://ledger@db/stock"),
            (DATABASE_MAX_CONNECTIONS_VAR, "12"),
            (REDIS_URL_VAR, "redis://bus:6379"),
            (EVENT_CHANNEL_VAR, "stock-events"),
            (CALL_TIMEOUT_VAR, "2500"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::Postgres);
        assert_eq!(config.database_url.as_deref(), Some("postgres://ledger@db/stock"));
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.redis_url.as_deref(), Some("redis://bus:6379"));
        assert_eq!(config.event_channel, "stock-events");
        assert_eq!(config.call_timeout, Some(Duration::from_millis(2500)));
        assert!(config.call_context().deadline_at().is_some());
    }

    #[test]
    fn unknown_backend_and_bad_numbers_are_rejected() {
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[(BACKEND_VAR, "mongo")])),
            Err(ConfigError::Invalid { var: BACKEND_VAR, .. })
        ));
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[(DATABASE_MAX_CONNECTIONS_VAR, "0")])),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            LedgerConfig::from_lookup(lookup(&[(CALL_TIMEOUT_VAR, "soon")])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = LedgerConfig::from_lookup(lookup(&[(REDIS_URL_VAR, "  ")])).unwrap();
        assert_eq!(config.redis_url, None);
    }

    #[tokio::test]
    async fn memory_backend_connects_without_external_services() {
        let backend = connect(&LedgerConfig::default()).await.unwrap();
        let items = backend.list_items(&CallContext::background()).await.unwrap();
        assert!(items.is_empty());
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn bus_address_without_redis_support_is_refused() {
        let config = LedgerConfig {
            redis_url: Some("redis://bus:6379".into()),
            ..LedgerConfig::default()
        };
        assert_eq!(
            connect(&config).await.err(),
            Some(ConfigError::Unsupported(REDIS_URL_VAR))
        );
    }
}
