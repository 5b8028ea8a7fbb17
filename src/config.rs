//! Process configuration read from the environment (and `.env`).

use crate::error::{NlqError, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_ROW_LIMIT: u64 = 500;
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub statement_timeout_ms: u64,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub port: u16,
    pub row_limit: u64,
    /// Optional JSON file replacing the built-in normalizer tables
    pub normalizer_config: Option<PathBuf>,
}

impl AppConfig {
    /// Load `.env` (if present) and build the configuration from the environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, "DB_URL")?;
        let api_key = required(&lookup, "GEMINI_API_KEY")?;

        Ok(Self {
            database: DatabaseConfig {
                url,
                statement_timeout_ms: parsed(&lookup, "STATEMENT_TIMEOUT", DEFAULT_STATEMENT_TIMEOUT_MS)?,
                max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            },
            llm: LlmConfig {
                api_key,
                model: lookup("GEMINI_MODEL")
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            },
            port: parsed(&lookup, "PORT", DEFAULT_PORT)?,
            row_limit: parsed(&lookup, "DEFAULT_LIMIT", DEFAULT_ROW_LIMIT)?,
            normalizer_config: lookup("NORMALIZER_CONFIG")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| NlqError::Config(format!("{} is not set. Put it in your .env.", key)))
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| NlqError::Config(format!("Invalid value for {}: {} ({})", key, raw, e))),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DB_URL", "postgres://localhost/colleges"),
            ("GEMINI_API_KEY", "key"),
        ]))
        .unwrap();

        assert_eq!(config.database.statement_timeout_ms, 10_000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.llm.model, "gemini-pro");
        assert_eq!(config.port, 5000);
        assert_eq!(config.row_limit, 500);
        assert!(config.normalizer_config.is_none());
    }

    #[test]
    fn test_missing_db_url() {
        let err = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "key")])).unwrap_err();
        assert!(err.to_string().contains("DB_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DB_URL", "postgres://localhost/colleges"),
            ("GEMINI_API_KEY", "key"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, NlqError::Config(_)));
    }
}
