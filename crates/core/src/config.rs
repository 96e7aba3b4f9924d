//! Configuration types shared across crates.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Relational store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseConfig {
    /// SQLite database (development and tests only, no notification feed).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer VERSYNC_SOURCE__PASSWORD / VERSYNC_TARGET__PASSWORD over the file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Schema holding the contract tables. Applied as the connection
        /// `search_path`, never spliced into query text.
        #[serde(default = "default_schema")]
        schema: String,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(300_000) // 5 minutes
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/contracts.db"),
        }
    }
}

impl DatabaseConfig {
    /// Validate database configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DatabaseConfig::Sqlite { .. } => Ok(()),
            DatabaseConfig::Postgres {
                url,
                host,
                database,
                schema,
                max_connections,
                ..
            } => {
                if *max_connections == 0 {
                    return Err("postgres max_connections must be at least 1".to_string());
                }
                if !is_valid_schema_name(schema) {
                    return Err(format!("invalid postgres schema name: {schema:?}"));
                }
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) => Ok(()),
                    (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Schema names end up in the connection `search_path`; keep them to plain identifiers.
fn is_valid_schema_name(schema: &str) -> bool {
    let mut chars = schema.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    schema.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checkpoint persistence configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding one cursor file per pipeline.
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("./data/checkpoints")
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
        }
    }
}

/// Batch loop configuration, shared by the replicate and push pipelines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows fetched per batch.
    pub batch_size: u32,
    /// Rows of one batch processed concurrently.
    pub concurrency: usize,
    /// Fixed delay after each processed row, in milliseconds.
    #[serde(default)]
    pub item_delay_ms: u64,
    /// Provenance tags (`created_by`) eligible for the scan.
    pub created_by: Vec<String>,
}

impl BatchConfig {
    /// Defaults for database-to-database replication: parallel, no delay.
    pub fn replicate_defaults() -> Self {
        Self {
            batch_size: 200,
            concurrency: 10,
            item_delay_ms: 0,
            created_by: vec!["sourcify".to_string()],
        }
    }

    /// Defaults for paths that call the rate-limited verification API:
    /// sequential with a fixed inter-request delay.
    pub fn push_defaults() -> Self {
        Self {
            batch_size: 50,
            concurrency: 1,
            item_delay_ms: 100,
            created_by: vec!["routescan".to_string()],
        }
    }

    /// Get the inter-item delay as a Duration.
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    /// Validate batch configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        if self.created_by.is_empty() {
            return Err("created_by must list at least one provenance tag".to_string());
        }
        Ok(())
    }
}

fn default_replicate() -> BatchConfig {
    BatchConfig::replicate_defaults()
}

fn default_push() -> BatchConfig {
    BatchConfig::push_defaults()
}

/// Notification forwarder configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardConfig {
    /// Notification channel to subscribe to.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Provenance tag written by this system; matching notifications are dropped.
    #[serde(default = "default_self_provenance")]
    pub self_provenance: String,
    /// Upper bound for handling one notification.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
}

fn default_channel() -> String {
    "new_verified_contract".to_string()
}

fn default_self_provenance() -> String {
    "sourcify".to_string()
}

fn default_handler_timeout_secs() -> u64 {
    60
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            self_provenance: default_self_provenance(),
            handler_timeout_secs: default_handler_timeout_secs(),
        }
    }
}

impl ForwardConfig {
    /// Get the handler timeout as a Duration.
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

/// External verification API configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Base URL of the verification server (paths are appended to it).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_base_url() -> String {
    "https://sourcify.dev/server".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl VerifierConfig {
    /// Get the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (development).
    #[default]
    Pretty,
    /// One JSON object per line (production).
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store the pipelines read from (and the one holding sync status).
    pub source: DatabaseConfig,
    /// Store the replicator writes to. Only required by `replicate`.
    pub target: Option<DatabaseConfig>,
    /// Checkpoint persistence.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Database-to-database replication loop.
    #[serde(default = "default_replicate")]
    pub replicate: BatchConfig,
    /// Database-to-API push loop.
    #[serde(default = "default_push")]
    pub push: BatchConfig,
    /// Notification forwarder.
    #[serde(default)]
    pub forward: ForwardConfig,
    /// External verification API.
    #[serde(default)]
    pub verifier: VerifierConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses SQLite stores under `./data`.
    pub fn for_testing() -> Self {
        Self {
            source: DatabaseConfig::default(),
            target: Some(DatabaseConfig::Sqlite {
                path: PathBuf::from("./data/target.db"),
            }),
            checkpoint: CheckpointConfig::default(),
            replicate: BatchConfig::replicate_defaults(),
            push: BatchConfig::push_defaults(),
            forward: ForwardConfig::default(),
            verifier: VerifierConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.source
            .validate()
            .map_err(|e| format!("source: {e}"))?;
        if let Some(target) = &self.target {
            target.validate().map_err(|e| format!("target: {e}"))?;
        }
        self.replicate
            .validate()
            .map_err(|e| format!("replicate: {e}"))?;
        self.push.validate().map_err(|e| format!("push: {e}"))?;
        self.verifier
            .retry
            .validate()
            .map_err(|e| format!("verifier.retry: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_defaults_differ_per_pipeline() {
        let replicate = BatchConfig::replicate_defaults();
        let push = BatchConfig::push_defaults();
        assert!(replicate.concurrency > 1);
        assert_eq!(replicate.item_delay_ms, 0);
        assert_eq!(push.concurrency, 1, "API path must default to sequential");
        assert_eq!(push.item_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_postgres_config_requires_host_and_database() {
        let json = r#"{"type":"postgres","host":"db.internal"}"#;
        let config: DatabaseConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"type":"postgres","host":"db.internal","database":"vera"}"#;
        let config: DatabaseConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        match config {
            DatabaseConfig::Postgres {
                port,
                schema,
                max_connections,
                ..
            } => {
                assert_eq!(port, Some(5432));
                assert_eq!(schema, "public");
                assert_eq!(max_connections, 10);
            }
            _ => panic!("expected postgres config"),
        }
    }

    #[test]
    fn test_postgres_schema_name_is_validated() {
        let config = DatabaseConfig::Postgres {
            url: Some("postgres://localhost/vera".to_string()),
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            schema: "public; DROP TABLE code".to_string(),
            max_connections: 4,
            statement_timeout_ms: None,
        };
        assert!(config.validate().is_err());
        assert!(is_valid_schema_name("vera_v2"));
        assert!(!is_valid_schema_name("2vera"));
        assert!(!is_valid_schema_name(""));
    }

    #[test]
    fn test_app_config_minimal_json() {
        let json = r#"{"source":{"type":"sqlite","path":"/tmp/src.db"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(config.target.is_none());
        assert_eq!(config.forward.channel, "new_verified_contract");
        assert_eq!(config.forward.self_provenance, "sourcify");
        assert_eq!(config.replicate.created_by, vec!["sourcify".to_string()]);
        assert_eq!(config.push.created_by, vec!["routescan".to_string()]);
        assert_eq!(config.log.format, LogFormat::Pretty);
        config.validate().unwrap();
    }

    #[test]
    fn test_batch_config_rejects_zero_concurrency() {
        let mut config = BatchConfig::replicate_defaults();
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
