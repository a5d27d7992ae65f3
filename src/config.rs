use anyhow::{bail, Context};

use crate::models::MAX_WINDOW_DAYS;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_WINDOW_DAYS: i64 = 28;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub window_days: i64,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Reads configuration through `get` so tests never touch the process
    /// environment.
    pub fn from_env_with<F>(mut get: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let max_connections = match get("HEALTH_TRENDS_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("HEALTH_TRENDS_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let window_days = match get("HEALTH_TRENDS_WINDOW_DAYS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("HEALTH_TRENDS_WINDOW_DAYS is not a number: {raw}"))?,
            None => DEFAULT_WINDOW_DAYS,
        };
        if !(2..=MAX_WINDOW_DAYS).contains(&window_days) {
            bail!(
                "HEALTH_TRENDS_WINDOW_DAYS must be between 2 and {MAX_WINDOW_DAYS}, got {window_days}"
            );
        }

        let log_filter = get("HEALTH_TRENDS_LOG")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| "info".into());

        Ok(Self {
            database_url,
            max_connections,
            window_days,
            log_filter,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance")
    }
}
