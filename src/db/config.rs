use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub journal_mode: SqliteJournalMode,
    pub foreign_keys: bool,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbConfigError> {
        let path = match std::env::var("DATABASE_PATH").ok().filter(|v| !v.trim().is_empty()) {
            Some(raw) => resolve_path(&raw),
            None => default_db_path().ok_or(DbConfigError::Missing {
                key: "DATABASE_PATH",
            })?,
        };

        let journal_mode = std::env::var("SQLITE_JOURNAL_MODE")
            .ok()
            .as_deref()
            .and_then(SqliteJournalMode::parse)
            .unwrap_or(SqliteJournalMode::Wal);

        Ok(Self {
            path,
            max_connections: env_u32("DB_MAX_CONNECTIONS", 5).max(1),
            busy_timeout: Duration::from_millis(env_u64("SQLITE_BUSY_TIMEOUT_MS", 10_000)),
            journal_mode,
            foreign_keys: env_bool("SQLITE_FOREIGN_KEYS", true),
        })
    }

    /// Configuration for a database file at an explicit location, all other
    /// settings at their defaults.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_millis(10_000),
            journal_mode: SqliteJournalMode::Wal,
            foreign_keys: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteJournalMode {
    Wal,
    Delete,
    Memory,
}

impl SqliteJournalMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "WAL" => Some(Self::Wal),
            "DELETE" => Some(Self::Delete),
            "MEMORY" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn to_sqlx(self) -> sqlx::sqlite::SqliteJournalMode {
        match self {
            SqliteJournalMode::Wal => sqlx::sqlite::SqliteJournalMode::Wal,
            SqliteJournalMode::Delete => sqlx::sqlite::SqliteJournalMode::Delete,
            SqliteJournalMode::Memory => sqlx::sqlite::SqliteJournalMode::Memory,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("Missing required env var: {key}")]
    Missing { key: &'static str },
}

fn default_db_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("renshu").join("renshu.db"))
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn resolve_path(value: &str) -> PathBuf {
    let raw = Path::new(value.trim());
    if raw.is_absolute() {
        return raw.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(raw))
        .unwrap_or_else(|_| raw.to_path_buf())
}
