//! Runtime configuration from the environment.

use std::path::PathBuf;

const DEFAULT_DATABASE: &str = "retail_crm.db";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite file for the row store, or `:memory:`
    pub database_path: String,
    pub log_level: String,
    /// Rolling log files go here when set
    pub log_dir: Option<PathBuf>,
    /// Bootstrap CEO account (email, password)
    pub admin: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: None,
            admin: None,
        }
    }
}

impl Config {
    /// Reads `CRM_*` variables. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Bad values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let log_level = match get("CRM_LOG_LEVEL") {
            Some(level) if LOG_LEVELS.contains(&level.to_lowercase().as_str()) => {
                level.to_lowercase()
            }
            Some(level) => {
                tracing::warn!(%level, "unknown CRM_LOG_LEVEL, using {DEFAULT_LOG_LEVEL}");
                defaults.log_level
            }
            None => defaults.log_level,
        };

        let admin = match (get("CRM_ADMIN_EMAIL"), lookup("CRM_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !password.is_empty() => Some((email, password)),
            (Some(_), _) => {
                tracing::warn!("CRM_ADMIN_EMAIL set without CRM_ADMIN_PASSWORD, skipping bootstrap");
                None
            }
            _ => None,
        };

        Self {
            database_path: get("CRM_DATABASE_PATH").unwrap_or(defaults.database_path),
            log_level,
            log_dir: get("CRM_LOG_DIR").map(PathBuf::from),
            admin,
        }
    }

    pub fn in_memory(&self) -> bool {
        self.database_path == ":memory:"
    }
}
