use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_check_interval: Duration,
    pub max_message_len: usize,
    pub cors_permissive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            db_max_connections: 16,
            db_check_interval: Duration::from_secs(5),
            max_message_len: 5000,
            cors_permissive: true,
        }
    }
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> anyhow::Result<Config> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();

        fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match get(key) {
                Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
                None => Ok(default),
            }
        }

        Ok(Config {
            database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            db_max_connections: parsed(&get, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_check_interval: Duration::from_secs(
                parsed(&get, "DB_CHECK_INTERVAL_SECS", defaults.db_check_interval.as_secs())?
            ),
            max_message_len: parsed(&get, "MAX_MESSAGE_LEN", defaults.max_message_len)?,
            cors_permissive: parsed(&get, "CORS_PERMISSIVE", defaults.cors_permissive)?,
        })
    }
}
