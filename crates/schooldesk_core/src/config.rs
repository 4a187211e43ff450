//! Environment-driven runtime configuration.
//!
//! Blank values count as unset.

use crate::logging::default_log_level;
use std::path::PathBuf;

/// SQLite database file; in-memory when unset.
pub const DB_PATH_ENV: &str = "SCHOOLDESK_DB_PATH";
/// Log level (`trace|debug|info|warn|error`).
pub const LOG_LEVEL_ENV: &str = "SCHOOLDESK_LOG_LEVEL";
/// Absolute log directory; file logging stays off when unset.
pub const LOG_DIR_ENV: &str = "SCHOOLDESK_LOG_DIR";

/// Source of configuration values.
///
/// Lets tests supply values without mutating the process environment.
pub trait ConfigEnv {
    fn string(&self, name: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl ConfigEnv for ProcessEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_env_with(&ProcessEnv)
    }

    pub fn from_env_with(env: &impl ConfigEnv) -> Self {
        Self {
            db_path: non_blank(env, DB_PATH_ENV).map(PathBuf::from),
            log_level: non_blank(env, LOG_LEVEL_ENV)
                .unwrap_or_else(|| default_log_level().to_string()),
            log_dir: non_blank(env, LOG_DIR_ENV).map(PathBuf::from),
        }
    }
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

fn non_blank(env: &impl ConfigEnv, name: &str) -> Option<String> {
    env.string(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
