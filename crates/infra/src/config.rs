//! Storage configuration from the environment.
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `LABOPS_STORE` | `memory`, `postgres` | `memory` |
//! | `DATABASE_URL` | Postgres connection string | required for `postgres` |
//! | `DATABASE_MAX_CONNECTIONS` | positive integer | `5` |

use anyhow::{anyhow, bail, Context};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres { url: String, max_connections: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let kind = lookup("LABOPS_STORE").unwrap_or_else(|| "memory".to_string());
        match kind.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::memory()),
            "postgres" => {
                let url = lookup("DATABASE_URL")
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| anyhow!("DATABASE_URL must be set when LABOPS_STORE=postgres"))?;
                let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                    Some(raw) => raw
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .with_context(|| {
                            format!("DATABASE_MAX_CONNECTIONS must be a positive integer, got '{raw}'")
                        })?,
                    None => DEFAULT_MAX_CONNECTIONS,
                };
                Ok(Self {
                    backend: StoreBackend::Postgres {
                        url,
                        max_connections,
                    },
                })
            }
            other => bail!("unknown LABOPS_STORE '{other}' (expected 'memory' or 'postgres')"),
        }
    }

    /// Open a connection pool. Only valid for the Postgres backend.
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let StoreBackend::Postgres {
            url,
            max_connections,
        } = &self.backend
        else {
            bail!("the in-memory backend has no connection pool");
        };

        tracing::info!(max_connections, "connecting to postgres");
        PgPoolOptions::new()
            .max_connections(*max_connections)
            .connect(url)
            .await
            .context("failed to connect to postgres")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_memory() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::memory());
    }

    #[test]
    fn postgres_reads_url_and_pool_size() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("LABOPS_STORE", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/labops"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            StoreBackend::Postgres {
                url: "postgres://localhost/labops".to_string(),
                max_connections: 12,
            }
        );
    }

    #[test]
    fn postgres_pool_size_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("LABOPS_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/labops"),
        ]))
        .unwrap();
        assert!(matches!(
            config.backend,
            StoreBackend::Postgres { max_connections: 5, .. }
        ));
    }

    #[test]
    fn postgres_without_url_is_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[("LABOPS_STORE", "postgres")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn bad_pool_size_and_unknown_backend_are_rejected() {
        assert!(StoreConfig::from_lookup(lookup(&[
            ("LABOPS_STORE", "postgres"),
            ("DATABASE_URL", "postgres://localhost/labops"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("LABOPS_STORE", "redis")])).is_err());
    }

    #[tokio::test]
    async fn memory_backend_has_no_pool() {
        assert!(StoreConfig::memory().connect().await.is_err());
    }
}
