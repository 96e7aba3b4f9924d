//! Configuration loading: optional TOML file merged with `VERSYNC_` env vars.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use versync_core::config::AppConfig;

/// Environment variable prefix; `__` separates nested keys.
pub const ENV_PREFIX: &str = "VERSYNC_";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "VERSYNC_CONFIG";

/// Load and validate configuration.
///
/// The file is optional; environment variables can provide or override
/// everything. Fails when neither is present.
pub fn load(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    let has_config_file = path.exists();
    if has_config_file {
        figment = figment.merge(Toml::file(path));
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with(ENV_PREFIX) && key != CONFIG_PATH_ENV);

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: versyncd --config /path/to/versync.toml <command>\n  \
             2. Environment variables: VERSYNC_SOURCE__TYPE=postgres \
             VERSYNC_SOURCE__URL=postgres://... versyncd <command>\n\n\
             See config/versync.example.toml for example configuration.\n\
             Set VERSYNC_CONFIG env var to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use versync_core::config::{DatabaseConfig, LogFormat};

    #[test]
    fn test_load_toml_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("versync.toml");
        std::fs::write(
            &path,
            r#"
[source]
type = "postgres"
host = "vera.internal"
database = "vera"
schema = "vera"

[target]
type = "sqlite"
path = "/tmp/target.db"

[push]
batch_size = 25
concurrency = 1
item_delay_ms = 250
created_by = ["routescan", "blockscout"]

[verifier]
base_url = "http://localhost:5555"

[verifier.retry]
max_attempts = 5

[log]
format = "json"
"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        match &config.source {
            DatabaseConfig::Postgres { schema, port, .. } => {
                assert_eq!(schema, "vera");
                assert_eq!(*port, Some(5432));
            }
            other => panic!("unexpected source: {other:?}"),
        }
        assert!(matches!(config.target, Some(DatabaseConfig::Sqlite { .. })));
        assert_eq!(config.push.batch_size, 25);
        assert_eq!(config.push.created_by.len(), 2);
        assert_eq!(config.replicate.batch_size, 200);
        assert_eq!(config.verifier.retry.max_attempts, 5);
        assert_eq!(config.verifier.retry.initial_backoff_ms, 500);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("versync.toml");
        std::fs::write(
            &path,
            r#"
[source]
type = "postgres"
host = "vera.internal"
"#,
        )
        .unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("database"));
    }
}
