//! Runtime configuration loaded from the environment
//!
//! All settings come from environment variables, optionally seeded from a
//! `.env` file by the binaries. `DATABASE_URL` is the only required value.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{EtlError, EtlResult};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    /// Directory where CSV extracts are staged before delivery.
    pub scratch_dir: PathBuf,
    /// Root directory for the local delivery sink.
    pub delivery_root: PathBuf,
}

impl PipelineConfig {
    /// Load configuration from the environment. Fails fast when
    /// `DATABASE_URL` is missing so no database work is attempted.
    pub fn from_env() -> EtlResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| EtlError::configuration("DATABASE_URL is not set"))?;

        Ok(Self {
            database_url,
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
            scratch_dir: std::env::var("EXPORT_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            delivery_root: std::env::var("DELIVERY_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./delivery")),
        })
    }

    /// Build a config around an explicit database URL, keeping defaults for
    /// everything else. Used by tests and the handler surface.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 5,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            scratch_dir: std::env::temp_dir(),
            delivery_root: PathBuf::from("./delivery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_database_url_defaults() {
        let config = PipelineConfig::with_database_url("postgresql://localhost:5432/dw");
        assert_eq!(config.database_url, "postgresql://localhost:5432/dw");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.scratch_dir, std::env::temp_dir());
    }
}
