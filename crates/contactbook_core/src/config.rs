//! Store configuration and backend factory.
//!
//! # Responsibility
//! - Parse the JSON store configuration.
//! - Open the configured backend behind one `ContactService` type.
//!
//! # Invariants
//! - A missing `backend` selects the in-memory store.
//! - Demo data is only seeded into an empty store.

use crate::db::{open_db, DbError};
use crate::logging::{default_log_level, init_logging};
use crate::model::contact::demo_contacts;
use crate::repo::contact_repo::{ContactRepository, RepoError};
use crate::repo::memory_repo::InMemoryContactRepository;
use crate::repo::sqlite_repo::SqliteContactRepository;
use crate::service::contact_service::ContactService;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Service type returned by [`open_contact_service`].
pub type DynContactService = ContactService<Box<dyn ContactRepository>>;

/// Backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    #[default]
    Memory,
    Sqlite {
        path: PathBuf,
    },
}

/// Optional logging section; see [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub dir: String,
}

fn default_level() -> String {
    default_log_level().to_string()
}

/// Top-level store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    pub seed_demo_data: bool,
    pub logging: Option<LogConfig>,
}

impl StoreConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Configuration and startup failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Db(DbError),
    Repo(RepoError),
    /// Logging backend refused the configured level or directory.
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read store config: {err}"),
            Self::Parse(err) => write!(f, "invalid store config: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Logging(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for ConfigError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Opens the repository selected by `backend`.
pub fn open_repository(backend: &BackendConfig) -> Result<Box<dyn ContactRepository>, ConfigError> {
    match backend {
        BackendConfig::Memory => Ok(Box::new(InMemoryContactRepository::new())),
        BackendConfig::Sqlite { path } => {
            let conn = open_db(path)?;
            Ok(Box::new(SqliteContactRepository::try_new(conn)?))
        }
    }
}

/// Starts logging (when configured), opens the backend and seeds it.
pub fn open_contact_service(config: &StoreConfig) -> Result<DynContactService, ConfigError> {
    if let Some(logging) = &config.logging {
        init_logging(&logging.level, &logging.dir).map_err(ConfigError::Logging)?;
    }

    let service = ContactService::new(open_repository(&config.backend)?);
    if config.seed_demo_data {
        service.seed_if_empty(demo_contacts())?;
    }

    info!(
        "event=store_open module=config status=ok backend={} seeded={}",
        backend_kind(&config.backend),
        config.seed_demo_data
    );
    Ok(service)
}

fn backend_kind(backend: &BackendConfig) -> &'static str {
    match backend {
        BackendConfig::Memory => "memory",
        BackendConfig::Sqlite { .. } => "sqlite",
    }
}

#[cfg(test)]
mod tests {
    use super::{open_contact_service, BackendConfig, ConfigError, StoreConfig};
    use crate::query::filter::ContactFilter;
    use std::path::PathBuf;

    #[test]
    fn empty_object_selects_unseeded_memory_store() {
        let config = StoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.backend, BackendConfig::Memory);
    }

    #[test]
    fn parses_sqlite_backend_and_logging() {
        let config = StoreConfig::from_json_str(
            r#"{
                "backend": { "kind": "sqlite", "path": "/tmp/contacts.db" },
                "seed_demo_data": true,
                "logging": { "dir": "/tmp/logs" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                path: PathBuf::from("/tmp/contacts.db")
            }
        );
        assert!(config.seed_demo_data);
        let logging = config.logging.unwrap();
        assert_eq!(logging.dir, "/tmp/logs");
        assert!(!logging.level.is_empty());
    }

    #[test]
    fn unknown_backend_kind_is_a_parse_error() {
        let err = StoreConfig::from_json_str(r#"{ "backend": { "kind": "redis" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn seeded_memory_service_holds_demo_contacts() {
        let config = StoreConfig {
            seed_demo_data: true,
            ..StoreConfig::default()
        };
        let service = open_contact_service(&config).unwrap();
        assert_eq!(service.size(&ContactFilter::new()).unwrap(), 3);
    }
}
