use anyhow::{bail, Context};
use std::fmt;
use std::time::Duration;

use crate::event::DomainIdentifier;
use crate::eventstore::WriterConfig;
use crate::sourceregistry::StaticSourceRegistry;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub clickhouse: ClickhouseConfig,
    pub eventstore: WriterConfig,
    pub source_registry: SourceRegistryConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Sets log level to debug
    pub debug: bool,
}

#[derive(Clone)]
pub struct ClickhouseConfig {
    /// HTTP endpoint, e.g. `http://clickhouse:8123`
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

// Keep the password out of logs.
impl fmt::Debug for ClickhouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickhouseConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SourceRegistryConfig {
    pub sources: Vec<DomainIdentifier>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the configuration from a variable lookup function
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let host = vars.get_or("PRISME_HOST", "0.0.0.0");
        let port = vars.parse_or("PRISME_PORT", 80u16)?;
        let debug = vars.flag("PRISME_DEBUG");

        let scheme = if vars.flag("PRISME_CLICKHOUSE_TLS") {
            "https"
        } else {
            "http"
        };
        let hostport = vars.required("PRISME_CLICKHOUSE_HOSTPORT")?;
        let database = vars.get_or("PRISME_CLICKHOUSE_DB", "prisme");
        let user = vars.required("PRISME_CLICKHOUSE_USER")?;
        let password = vars.required("PRISME_CLICKHOUSE_PASSWORD")?;

        let raw_sources = vars.required("PRISME_SOURCE_REGISTRY_SOURCES")?;
        let sources = StaticSourceRegistry::parse_list(&raw_sources)
            .context("PRISME_SOURCE_REGISTRY_SOURCES must be a comma separated list of domains")?;

        let defaults = WriterConfig::default();
        let queue_capacity =
            vars.parse_or("PRISME_EVENTSTORE_QUEUE_CAPACITY", defaults.queue_capacity)?;
        let max_batch_size =
            vars.parse_or("PRISME_EVENTSTORE_MAX_BATCH_SIZE", defaults.max_batch_size)?;
        let max_batch_age_ms = vars.parse_or(
            "PRISME_EVENTSTORE_MAX_BATCH_TIMEOUT_MS",
            defaults.max_batch_age.as_millis() as u64,
        )?;

        if queue_capacity == 0 || max_batch_size == 0 {
            bail!("PRISME_EVENTSTORE_QUEUE_CAPACITY and PRISME_EVENTSTORE_MAX_BATCH_SIZE must be greater than zero");
        }

        Ok(Config {
            server: ServerConfig { host, port, debug },
            clickhouse: ClickhouseConfig {
                url: format!("{scheme}://{hostport}"),
                database,
                user,
                password,
            },
            eventstore: WriterConfig {
                queue_capacity,
                max_batch_size,
                max_batch_age: Duration::from_millis(max_batch_age_ms),
            },
            source_registry: SourceRegistryConfig { sources },
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get_or(&self, name: &str, default: &str) -> String {
        (self.0)(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &str) -> anyhow::Result<String> {
        match (self.0)(name) {
            Some(value) if !value.is_empty() => Ok(value),
            Some(_) => bail!("{name} environment variable is an empty string"),
            None => bail!("{name} environment variable not set"),
        }
    }

    fn flag(&self, name: &str) -> bool {
        (self.0)(name)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    fn parse_or<T>(&self, name: &str, default: T) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match (self.0)(name) {
            Some(value) => value
                .parse::<T>()
                .with_context(|| format!("{name} environment variable is not valid: {value:?}")),
            None => Ok(default),
        }
    }
}
