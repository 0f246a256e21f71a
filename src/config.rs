//! Server configuration loaded from environment variables.

use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Database file (from SCHEMA_LEDGER_DB). `None` uses the platform data directory.
    pub db_path: Option<PathBuf>,
    /// Bind address (from SCHEMA_LEDGER_HOST)
    pub host: String,
    /// Bind port (from SCHEMA_LEDGER_PORT)
    pub port: u16,
    /// Allowed CORS origins (from SCHEMA_LEDGER_CORS_ORIGINS, comma-separated).
    /// `None` means permissive CORS.
    pub cors_origins: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("SCHEMA_LEDGER_DB")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let host = lookup("SCHEMA_LEDGER_HOST")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup("SCHEMA_LEDGER_PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid SCHEMA_LEDGER_PORT '{}'", raw);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let cors_origins = lookup("SCHEMA_LEDGER_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty());

        Self {
            db_path,
            host,
            port,
            cors_origins,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: None,
        }
    }
}
