//! Configuration management for graphlink clients.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (GRAPHLINK__NEO4J__ENDPOINT, ...)
//! 2. Config file (graphlink.toml, `[neo4j]` section)
//! 3. Defaults

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Params;
use crate::types::Value;

/// Connection settings for a graph database.
///
/// The client takes ownership of its config at construction and only hands
/// out shared references afterwards.
#[derive(Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Bolt endpoint, e.g. `bolt://localhost:7687`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Database used when a call does not name one.
    #[serde(default = "default_database")]
    pub database: String,

    /// Upper bound on pooled driver connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Rows pulled per round-trip while streaming results.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_endpoint() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_username() -> String {
    "neo4j".to_string()
}

fn default_database() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            username: default_username(),
            password: String::new(),
            database: default_database(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Load the `[neo4j]` section from `{file_prefix}.toml` (optional) and
    /// `GRAPHLINK__NEO4J__*` environment variables.
    pub fn load(file_prefix: &str) -> Result<Self, CoreError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("GRAPHLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(&cfg)
    }

    /// Extract the `neo4j` section of an already-built config.
    /// A missing section yields the defaults.
    pub fn from_config(cfg: &config::Config) -> Result<Self, CoreError> {
        match cfg.get::<ClientConfig>("neo4j") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => {
                tracing::debug!("No [neo4j] config section, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Options for a single write transaction.
///
/// Neither field is interpreted by the client; both are handed to the
/// driver when the transaction begins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionConfig {
    pub timeout: Option<Duration>,
    pub metadata: Params,
}

impl TransactionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
