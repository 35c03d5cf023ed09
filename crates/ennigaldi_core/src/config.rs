//! Host-provided configuration for opening the accession core.
//!
//! # Responsibility
//! - Describe where the registry database lives and how to log.
//! - Bootstrap logging and a migrated connection from one value.
//!
//! # Invariants
//! - Logging is only initialized when a log directory is configured.
//! - A missing database path means an in-memory database.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::{default_log_level, init_logging, LoggingError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Core bootstrap settings, typically deserialized from the host's config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file path. `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

/// Bootstrap failure from [`open_with_config`].
#[derive(Debug)]
pub enum ConfigError {
    Logging(LoggingError),
    Db(DbError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Initializes logging (when configured) and opens the migrated database.
pub fn open_with_config(config: &CoreConfig) -> Result<Connection, ConfigError> {
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = match config.db_path.as_ref() {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    Ok(conn)
}
