//! Configuration management

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Address the HTTP server binds to
    pub http_addr: String,

    /// Upper bound on simultaneously in-flight store writes per import
    /// request (batch upserts or per-row merge transactions)
    pub max_concurrent_writes: usize,

    /// Upper bound on an uploaded file's size in bytes
    pub max_upload_bytes: usize,
}

const DEFAULT_MAX_CONCURRENT_WRITES: usize = 8;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let http_addr = std::env::var("HTTP_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let max_concurrent_writes = match std::env::var("MAX_CONCURRENT_WRITES") {
            Ok(v) => v
                .parse::<usize>()
                .context("MAX_CONCURRENT_WRITES must be a positive integer")?,
            Err(_) => DEFAULT_MAX_CONCURRENT_WRITES,
        };
        if max_concurrent_writes == 0 {
            anyhow::bail!("MAX_CONCURRENT_WRITES must be at least 1");
        }

        let max_upload_bytes = match std::env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v
                .parse::<usize>()
                .context("MAX_UPLOAD_BYTES must be a positive integer")?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            http_addr,
            max_concurrent_writes,
            max_upload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::remove_var("HTTP_ADDR");
        std::env::remove_var("MAX_CONCURRENT_WRITES");
        std::env::remove_var("MAX_UPLOAD_BYTES");

        let config = Config::from_env().unwrap();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.max_concurrent_writes, DEFAULT_MAX_CONCURRENT_WRITES);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_zero_writes_rejected() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("MAX_CONCURRENT_WRITES", "0");

        assert!(Config::from_env().is_err());

        // Cleanup
        std::env::remove_var("MAX_CONCURRENT_WRITES");
    }
}
