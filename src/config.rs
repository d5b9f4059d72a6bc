//! Application configuration loaded from environment variables.
//!
//! All configuration is read once at startup (optionally from a `.env` file)
//! and is not reloaded while the service runs.
//!
//! # Rate Limiting
//!
//! - `RATE_LIMIT_CAPACITY`: Burst capacity per client (default: 100, 0 = disabled)
//! - `RATE_LIMIT_REFILL_RATE`: Tokens restored per interval (default: 10)
//! - `RATE_LIMIT_REFILL_INTERVAL_MS`: Refill interval length (default: 1000)
//! - `RATE_LIMIT_EXEMPT_PATHS`: Comma-separated path prefixes that bypass the
//!   limiter (default: `/health,/ready`)
//! - `TRUSTED_PROXIES`: CIDR ranges allowed to set `X-Forwarded-For`
//! - `BUCKET_SWEEP_INTERVAL_SECS`: Idle bucket eviction period (default: 60, 0 = off)

use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::limiter::BucketPolicy;

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Maximum tokens per client bucket (default: 100).
    /// Set to 0 to disable rate limiting.
    pub rate_limit_capacity: u32,

    /// Tokens added per refill interval (default: 10)
    pub rate_limit_refill_rate: u32,

    /// Refill interval in milliseconds (default: 1000)
    pub rate_limit_refill_interval_ms: u64,

    /// Path prefixes that bypass rate limiting entirely.
    /// Default: ["/health", "/ready"]
    pub rate_limit_exempt_paths: Vec<String>,

    /// Trusted proxy CIDR ranges. `X-Forwarded-For` is only honored from
    /// these networks; empty means every peer is trusted.
    ///
    /// Format: Comma-separated CIDR notation (e.g., "10.0.0.0/8,172.16.0.0/12")
    pub trusted_proxies: Vec<String>,

    /// How often idle buckets are evicted (default: 60s, zero = never)
    pub bucket_sweep_interval: Duration,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a value cannot be parsed or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Rate limiting
            rate_limit_capacity: Self::parse_env("RATE_LIMIT_CAPACITY", 100)?,
            rate_limit_refill_rate: Self::parse_env("RATE_LIMIT_REFILL_RATE", 10)?,
            rate_limit_refill_interval_ms: Self::parse_env("RATE_LIMIT_REFILL_INTERVAL_MS", 1000)?,
            rate_limit_exempt_paths: Self::parse_exempt_paths(
                &env::var("RATE_LIMIT_EXEMPT_PATHS").unwrap_or_else(|_| "/health,/ready".into()),
            )?,
            trusted_proxies: Self::parse_list(&env::var("TRUSTED_PROXIES").unwrap_or_default()),
            bucket_sweep_interval: Duration::from_secs(Self::parse_env(
                "BUCKET_SWEEP_INTERVAL_SECS",
                60,
            )?),

            // Observability
            metrics_port: Self::parse_env("METRICS_PORT", 0)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if !self.rate_limiting_enabled() {
            return Ok(());
        }

        if self.rate_limit_refill_rate == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_REFILL_RATE must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_refill_interval_ms == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_REFILL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }

        self.bucket_policy()
            .map(|_| ())
            .map_err(|e| AppError::ConfigError(e.to_string()))
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit_capacity > 0
    }

    /// Bucket shape derived from the rate limiting settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidRateLimit` if any setting is zero.
    pub fn bucket_policy(&self) -> AppResult<BucketPolicy> {
        Ok(BucketPolicy::new(
            self.rate_limit_capacity,
            self.rate_limit_refill_rate,
            self.rate_limit_refill_interval_ms,
        )?)
    }

    /// Check if the idle bucket sweeper should run.
    pub fn bucket_sweep_enabled(&self) -> bool {
        !self.bucket_sweep_interval.is_zero()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Split a comma-separated list, dropping blanks.
    fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Parse exempt path prefixes; every entry must start with `/`.
    fn parse_exempt_paths(raw: &str) -> AppResult<Vec<String>> {
        let paths = Self::parse_list(raw);

        if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
            return Err(AppError::ConfigError(format!(
                "RATE_LIMIT_EXEMPT_PATHS entry '{bad}' must start with '/'"
            )));
        }

        Ok(paths)
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            rate_limit_capacity: 100,
            rate_limit_refill_rate: 10,
            rate_limit_refill_interval_ms: 1000,
            rate_limit_exempt_paths: vec!["/health".to_string(), "/ready".to_string()],
            trusted_proxies: vec![],
            bucket_sweep_interval: Duration::from_secs(60),
            metrics_port: 0,
        }
    }
}
