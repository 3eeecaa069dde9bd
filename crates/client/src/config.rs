//! Environment-based client configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use fabricsync_observability::LogFormat;

use crate::retry::RetryPolicy;
use crate::store::{default_data_dir, FileStore, InMemoryStore, KeyValueStore, SqliteStore};
use crate::sync_worker::DEFAULT_SYNC_INTERVAL;

const DEFAULT_API_URL: &str = "http://localhost:54321";

/// Which key-value backend holds local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    File,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "file" => Ok(StoreKind::File),
            "sqlite" => Ok(StoreKind::Sqlite),
            other => bail!("unknown store '{other}' (expected memory, file or sqlite)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub auth_token: Option<String>,
    pub store: StoreKind,
    pub data_dir: PathBuf,
    pub sync_interval: Duration,
    pub retry: RetryPolicy,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Read `FABRICSYNC_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("FABRICSYNC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_key = lookup("FABRICSYNC_API_KEY").unwrap_or_default();
        let auth_token = lookup("FABRICSYNC_AUTH_TOKEN").filter(|t| !t.is_empty());

        let store = match lookup("FABRICSYNC_STORE") {
            Some(s) => s.parse().context("invalid FABRICSYNC_STORE")?,
            None => StoreKind::Sqlite,
        };

        let data_dir = match lookup("FABRICSYNC_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let sync_interval = match lookup("FABRICSYNC_SYNC_INTERVAL_SECS") {
            Some(secs) => {
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .context("FABRICSYNC_SYNC_INTERVAL_SECS must be a whole number of seconds")?;
                if secs == 0 {
                    bail!("FABRICSYNC_SYNC_INTERVAL_SECS must be positive");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_SYNC_INTERVAL,
        };

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = lookup("FABRICSYNC_MAX_ATTEMPTS") {
            let attempts: u32 = attempts
                .trim()
                .parse()
                .context("FABRICSYNC_MAX_ATTEMPTS must be a positive integer")?;
            retry = retry.with_max_attempts(attempts);
        }

        let log_format = match lookup("FABRICSYNC_LOG_FORMAT") {
            Some(f) => f
                .parse::<LogFormat>()
                .map_err(anyhow::Error::msg)
                .context("invalid FABRICSYNC_LOG_FORMAT")?,
            None => LogFormat::default(),
        };

        Ok(Self {
            api_url,
            api_key,
            auth_token,
            store,
            data_dir,
            sync_interval,
            retry,
            log_format,
        })
    }

    /// Open the configured key-value store, creating the data directory.
    pub async fn open_store(&self) -> anyhow::Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self.store {
            StoreKind::Memory => InMemoryStore::arc(),
            StoreKind::File => Arc::new(
                FileStore::open(self.data_dir.join("store"))
                    .await
                    .with_context(|| format!("failed to open file store in {}", self.data_dir.display()))?,
            ),
            StoreKind::Sqlite => {
                tokio::fs::create_dir_all(&self.data_dir)
                    .await
                    .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
                let path = self.data_dir.join("fabricsync.db");
                Arc::new(
                    SqliteStore::open(&path)
                        .await
                        .with_context(|| format!("failed to open database {}", path.display()))?,
                )
            }
        };
        tracing::info!(store = ?self.store, data_dir = %self.data_dir.display(), "opened local store");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ClientConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("FABRICSYNC_DATA_DIR", "/tmp/fs")]).unwrap();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.store, StoreKind::Sqlite);
        assert_eq!(cfg.sync_interval, Duration::from_secs(30));
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.auth_token, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("FABRICSYNC_DATA_DIR", "/tmp/fs"),
            ("FABRICSYNC_STORE", "File"),
            ("FABRICSYNC_SYNC_INTERVAL_SECS", "5"),
            ("FABRICSYNC_MAX_ATTEMPTS", "6"),
            ("FABRICSYNC_LOG_FORMAT", "pretty"),
            ("FABRICSYNC_AUTH_TOKEN", "jwt"),
        ])
        .unwrap();
        assert_eq!(cfg.store, StoreKind::File);
        assert_eq!(cfg.sync_interval, Duration::from_secs(5));
        assert_eq!(cfg.retry.max_attempts, 6);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.auth_token.as_deref(), Some("jwt"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("FABRICSYNC_DATA_DIR", "/tmp"), ("FABRICSYNC_STORE", "redis")]).unwrap_err();
        assert!(err.to_string().contains("FABRICSYNC_STORE"));

        assert!(config(&[("FABRICSYNC_DATA_DIR", "/tmp"), ("FABRICSYNC_SYNC_INTERVAL_SECS", "0")]).is_err());
        assert!(config(&[("FABRICSYNC_DATA_DIR", "/tmp"), ("FABRICSYNC_MAX_ATTEMPTS", "many")]).is_err());
    }

    #[tokio::test]
    async fn opens_memory_store() {
        let cfg = config(&[("FABRICSYNC_DATA_DIR", "/tmp/fs"), ("FABRICSYNC_STORE", "memory")]).unwrap();
        let store = cfg.open_store().await.unwrap();
        assert!(store.list("mutation_queue").await.unwrap().is_empty());
    }
}
