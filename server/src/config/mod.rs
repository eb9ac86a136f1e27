use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::security_header_layers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/boxoffice";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CODE_ATTEMPTS: u32 = 3;
const DEV_TOKEN_SECRET: &str = "boxoffice-development-secret";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub token_secret: String,
    pub token_ttl: Duration,
    pub lock_timeout: Duration,
    pub code_attempts: u32,
    pub allowed_origins: Vec<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let production = lookup("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let token_secret = match lookup("AUTH_TOKEN_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None => {
                tracing::warn!("AUTH_TOKEN_SECRET not set, using the development secret");
                DEV_TOKEN_SECRET.to_string()
            }
        };

        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001)))?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            token_secret,
            token_ttl: Duration::from_secs(parse_or(
                &lookup,
                "AUTH_TOKEN_TTL_SECS",
                DEFAULT_TOKEN_TTL_SECS,
            )?),
            lock_timeout: Duration::from_millis(parse_or(
                &lookup,
                "CHECKOUT_LOCK_TIMEOUT_MS",
                DEFAULT_LOCK_TIMEOUT_MS,
            )?),
            code_attempts: parse_or(&lookup, "CHECKOUT_CODE_ATTEMPTS", DEFAULT_CODE_ATTEMPTS)?,
            allowed_origins,
            production,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.token_secret, DEV_TOKEN_SECRET);
        assert_eq!(config.lock_timeout, Duration::from_millis(5_000));
        assert_eq!(config.code_attempts, 3);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "http://localhost:5173"]
        );
        assert!(!config.production);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("CHECKOUT_LOCK_TIMEOUT_MS", "250"),
            ("AUTH_TOKEN_SECRET", "s3cret"),
            ("CORS_ALLOWED_ORIGINS", "https://tickets.example, ,https://admin.example"),
            ("RUST_ENV", "Production"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.token_secret, "s3cret");
        assert_eq!(
            config.allowed_origins,
            vec!["https://tickets.example", "https://admin.example"]
        );
        assert!(config.production);
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = config_from(&[("DB_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: "many".to_string()
            }
        );
    }
}
