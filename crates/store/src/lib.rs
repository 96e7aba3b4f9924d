//! Contract store abstraction and implementations for versync.
//!
//! This crate provides read/write access to a verified-contract store:
//! - Content-addressed code and sources, inserted only when absent
//! - Contracts, deployments and compilations looked up by natural key
//! - Whole-record replication in one transaction
//! - The engine-owned sync status table
//! - The `new_verified_contract` notification feed (PostgreSQL only)

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use postgres::PostgresStore;
pub use repos::{NotificationFeed, ReplicaRepo, SourceRepo, SyncStatusRepo};
pub use store::{ContractStore, SqliteStore};

use std::sync::Arc;
use versync_core::config::DatabaseConfig;

/// Create a contract store from configuration.
pub async fn from_config(config: &DatabaseConfig) -> StoreResult<Arc<dyn ContractStore>> {
    match config {
        DatabaseConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn ContractStore>)
        }
        DatabaseConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            schema,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence over individual fields
                tracing::info!(schema = %schema, "Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, schema, *max_connections, *statement_timeout_ms)
                    .await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    schema,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(StoreError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn ContractStore>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("contracts.db");
        let config = DatabaseConfig::Sqlite {
            path: db_path.clone(),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_from_config_postgres_requires_host_or_url() {
        let config = DatabaseConfig::Postgres {
            url: None,
            host: None,
            port: Some(5432),
            username: None,
            password: None,
            database: Some("vera".to_string()),
            ssl_mode: None,
            schema: "public".to_string(),
            max_connections: 2,
            statement_timeout_ms: None,
        };

        let err = from_config(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
