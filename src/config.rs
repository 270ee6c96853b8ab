//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// PostgreSQL schema holding the collections
    pub database_schema: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// How long an identity read is reused
    pub identity_cache_ttl: Duration,

    /// How long any other cached read is reused
    pub query_cache_ttl: Duration,

    /// Provider session lifetime
    pub session_ttl: chrono::Duration,

    pub default_page_size: usize,
    pub max_page_size: usize,
}

fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingEnv(name))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let database_schema = env::var("DATABASE_SCHEMA").unwrap_or_else(|_| "eventcity".to_string());
        if !is_identifier(&database_schema) {
            return Err(ConfigError::InvalidValue("DATABASE_SCHEMA"));
        }

        let session_days: i64 = var_or("SESSION_TTL_DAYS", 7)?;
        if session_days <= 0 {
            return Err(ConfigError::InvalidValue("SESSION_TTL_DAYS"));
        }

        let default_page_size: usize = var_or("DEFAULT_PAGE_SIZE", 12)?;
        let max_page_size: usize = var_or("MAX_PAGE_SIZE", 100)?;
        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(ConfigError::InvalidValue("DEFAULT_PAGE_SIZE"));
        }

        Ok(Self {
            database_url,
            database_schema,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10)?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: var_or("PORT", 3000)?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            identity_cache_ttl: Duration::from_secs(var_or("IDENTITY_CACHE_SECS", 300)?),
            query_cache_ttl: Duration::from_secs(var_or("QUERY_CACHE_SECS", 30)?),
            session_ttl: chrono::Duration::days(session_days),
            default_page_size,
            max_page_size,
        })
    }

    /// Settings suitable for tests and local runs without an environment
    pub fn local() -> Self {
        Self {
            database_url: String::new(),
            database_schema: "eventcity".to_string(),
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            identity_cache_ttl: Duration::from_secs(300),
            query_cache_ttl: Duration::from_secs(30),
            session_ttl: chrono::Duration::days(7),
            default_page_size: 12,
            max_page_size: 100,
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Clamp a requested page size
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

/// Settings for the provisioning CLI
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// PostgreSQL URL of the store
    pub endpoint: String,
    /// Reported as the connection's application name
    pub project_id: String,
    /// Schema holding the collections
    pub database_id: String,
    /// Administrative credential, used as the connection password
    pub api_key: String,
}

impl ProvisionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            endpoint: required("STORE_ENDPOINT")?,
            project_id: required("STORE_PROJECT_ID")?,
            database_id: required("STORE_DATABASE_ID")?,
            api_key: required("STORE_API_KEY")?,
        };
        if !is_identifier(&config.database_id) {
            return Err(ConfigError::InvalidValue("STORE_DATABASE_ID"));
        }
        Ok(config)
    }
}

/// Safe to splice into SQL as an unquoted identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.len() <= 63
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert!(is_identifier("eventcity"));
        assert!(is_identifier("event_city_2"));
        assert!(!is_identifier("2events"));
        assert!(!is_identifier("events; drop table x"));
        assert!(!is_identifier("Events"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_page_size_is_clamped() {
        let config = Config::local();
        assert_eq!(config.page_size(None), 12);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(500)), 100);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnv("STORE_ENDPOINT");
        assert_eq!(err.to_string(), "Missing environment variable: STORE_ENDPOINT");
    }
}
