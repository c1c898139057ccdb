//! Server configuration from environment variables.

use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

/// Per-client request rate limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    pub enabled: bool,
    /// Sustained requests per second per client.
    pub rps: u32,
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 2,
            burst: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Deployment environment name reported by the health check.
    pub env: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_idle_timeout: Duration,
    pub limiter: LimiterConfig,
    /// Origins allowed by CORS. Empty disables the CORS layer.
    pub cors_trusted_origins: Vec<String>,
    /// Static bearer tokens in `token=perm,perm;token=perm` form.
    pub api_tokens: String,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Required: `DATABASE_URL`.
    /// Optional: `PORT` (4000), `APP_ENV` (development), `DB_MAX_CONNECTIONS` (25),
    /// `DB_IDLE_TIMEOUT_SECS` (900), `LIMITER_ENABLED` (true), `LIMITER_RPS` (2),
    /// `LIMITER_BURST` (4), `CORS_TRUSTED_ORIGINS` (space separated), `API_TOKENS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;
        let defaults = LimiterConfig::default();

        Ok(Self {
            port: parse_or(&lookup, "PORT", 4000)?,
            env: lookup("APP_ENV").unwrap_or_else(|| "development".into()),
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 25)?,
            db_idle_timeout: Duration::from_secs(parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", 900)?),
            limiter: LimiterConfig {
                enabled: parse_or(&lookup, "LIMITER_ENABLED", defaults.enabled)?,
                rps: parse_or(&lookup, "LIMITER_RPS", defaults.rps)?,
                burst: parse_or(&lookup, "LIMITER_BURST", defaults.burst)?,
            },
            cors_trusted_origins: lookup("CORS_TRUSTED_ORIGINS")
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            api_tokens: lookup("API_TOKENS").unwrap_or_default(),
        })
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}
