//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Absent ⇒ in-memory stores (data is lost on restart).
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Absent ⇒ photo bytes are kept in memory.
    pub blob_dir: Option<PathBuf>,
    pub blob_public_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            db_max_connections: 5,
            blob_dir: None,
            blob_public_base_url: "/files".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DB_MAX_CONNECTIONS",
                        value: raw,
                        reason: "expected a positive integer".to_string(),
                    });
                }
            },
            None => defaults.db_max_connections,
        };

        if let Some(raw) = get("LOG_FORMAT") {
            if !matches!(raw.to_ascii_lowercase().as_str(), "json" | "pretty" | "text") {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: raw,
                    reason: "expected 'json' or 'pretty'".to_string(),
                });
            }
        }

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            blob_dir: get("BLOB_DIR").map(PathBuf::from),
            blob_public_base_url: get("BLOB_PUBLIC_BASE_URL").unwrap_or(defaults.blob_public_base_url),
        })
    }
}
