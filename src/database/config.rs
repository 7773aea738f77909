//! Process configuration from environment variables
//!
//! The loader is configured entirely through the environment:
//!
//! | Variable       | Meaning                                         |
//! |----------------|-------------------------------------------------|
//! | `SRC_BASE_DIR` | Directory holding `schemas.json` and datasets   |
//! | `DB_USER`      | Database user                                   |
//! | `DB_PASS`      | Database password                               |
//! | `DB_HOST`      | Database host                                   |
//! | `DB_PORT`      | Database port                                   |
//! | `DB_NAME`      | Database name (file path for DuckDB)            |
//! | `DB_BACKEND`   | Optional, `postgres` (default) or `duckdb`      |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Environment variable for the source directory
pub const ENV_SRC_BASE_DIR: &str = "SRC_BASE_DIR";

/// Environment variable for the database user
pub const ENV_DB_USER: &str = "DB_USER";

/// Environment variable for the database password
pub const ENV_DB_PASS: &str = "DB_PASS";

/// Environment variable for the database host
pub const ENV_DB_HOST: &str = "DB_HOST";

/// Environment variable for the database port
pub const ENV_DB_PORT: &str = "DB_PORT";

/// Environment variable for the database name
pub const ENV_DB_NAME: &str = "DB_NAME";

/// Environment variable for the database backend
pub const ENV_DB_BACKEND: &str = "DB_BACKEND";

/// Variables that must be present and non-empty
pub const REQUIRED_ENV_VARS: [&str; 6] = [
    ENV_SRC_BASE_DIR,
    ENV_DB_USER,
    ENV_DB_PASS,
    ENV_DB_HOST,
    ENV_DB_PORT,
    ENV_DB_NAME,
];

/// Errors raised while assembling the configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A variable is set but its value cannot be used
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Database backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackendType {
    /// PostgreSQL database (default)
    #[default]
    Postgres,
    /// DuckDB embedded database
    DuckDB,
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(DatabaseBackendType::DuckDB),
            "postgres" | "postgresql" => Ok(DatabaseBackendType::Postgres),
            _ => Err(format!(
                "Unknown database backend: {}. Use 'duckdb' or 'postgres'.",
                s
            )),
        }
    }
}

impl fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackendType::DuckDB => write!(f, "duckdb"),
            DatabaseBackendType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Credentials and address of the destination database
///
/// Built once per run and shared read-only with every write.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub backend: DatabaseBackendType,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl ConnectionDescriptor {
    /// URL scheme for the backend
    pub fn protocol(&self) -> &'static str {
        match self.backend {
            DatabaseBackendType::Postgres => "postgresql",
            DatabaseBackendType::DuckDB => "duckdb",
        }
    }

    /// Connection URL, password included
    pub fn url(&self) -> String {
        self.format_url(&self.password)
    }

    /// Connection URL with the password replaced by `****`
    pub fn masked_url(&self) -> String {
        self.format_url("****")
    }

    fn format_url(&self, password: &str) -> String {
        match self.backend {
            DatabaseBackendType::Postgres => format!(
                "{}://{}:{}@{}:{}/{}",
                self.protocol(),
                self.user,
                password,
                self.host,
                self.port,
                self.database
            ),
            DatabaseBackendType::DuckDB => format!("{}://{}", self.protocol(), self.database),
        }
    }
}

// Never print the password, even in debug output
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("backend", &self.backend)
            .field("user", &self.user)
            .field("password", &"****")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked_url())
    }
}

/// Complete loader configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory containing `schemas.json` and one subdirectory per dataset
    pub src_base_dir: PathBuf,
    /// Destination database
    pub connection: ConnectionDescriptor,
}

impl LoaderConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        // Report the first missing variable in declaration order
        for name in REQUIRED_ENV_VARS {
            required(name)?;
        }

        let port_value = required(ENV_DB_PORT)?;
        let port = port_value
            .trim()
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidVar {
                name: ENV_DB_PORT,
                value: port_value.clone(),
                reason: e.to_string(),
            })?;

        let backend = match lookup(ENV_DB_BACKEND).filter(|v| !v.trim().is_empty()) {
            Some(value) => {
                value
                    .trim()
                    .parse::<DatabaseBackendType>()
                    .map_err(|reason| ConfigError::InvalidVar {
                        name: ENV_DB_BACKEND,
                        value: value.clone(),
                        reason,
                    })?
            }
            None => DatabaseBackendType::default(),
        };

        Ok(Self {
            src_base_dir: PathBuf::from(required(ENV_SRC_BASE_DIR)?),
            connection: ConnectionDescriptor {
                backend,
                user: required(ENV_DB_USER)?,
                password: required(ENV_DB_PASS)?,
                host: required(ENV_DB_HOST)?,
                port,
                database: required(ENV_DB_NAME)?,
            },
        })
    }
}
