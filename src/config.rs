use std::str::FromStr;

use anyhow::{Context, Result};

use crate::sensors::ServiceSettings;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Which reading store the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("unknown storage backend: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    /// Readings live in process memory and are lost on restart.
    Memory,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: Storage,
    pub server_host: String,
    pub server_port: u16,
    pub history_limit: usize,
    pub history_max_limit: usize,
    pub ingest_strict: bool,
    /// Readings older than this many days are deleted. `None` keeps everything.
    pub retention_days: Option<u32>,
    /// Retention sweep interval in seconds.
    pub retention_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        let storage = match env.optional("STORAGE_BACKEND", "postgres").parse::<StorageKind>()? {
            StorageKind::Postgres => Storage::Postgres {
                database_url: env.required("DATABASE_URL")?,
                max_connections: env
                    .optional("DATABASE_MAX_CONNECTIONS", "10")
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            },
            StorageKind::Memory => Storage::Memory,
        };

        let history_limit: usize = env
            .optional("HISTORY_LIMIT", "10")
            .parse()
            .context("HISTORY_LIMIT must be a positive integer")?;
        let history_max_limit: usize = env
            .optional("HISTORY_MAX_LIMIT", "100")
            .parse()
            .context("HISTORY_MAX_LIMIT must be a positive integer")?;
        anyhow::ensure!(
            (1..=history_max_limit).contains(&history_limit),
            "HISTORY_LIMIT must be between 1 and HISTORY_MAX_LIMIT ({history_max_limit}), got {history_limit}"
        );

        Ok(Self {
            storage,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env
                .optional("SERVER_PORT", "3001")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            history_limit,
            history_max_limit,
            ingest_strict: parse_bool(&env.optional("INGEST_STRICT", "false"))
                .context("INGEST_STRICT must be true or false")?,
            retention_days: env
                .get("RETENTION_DAYS")
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().parse::<u32>())
                .transpose()
                .context("RETENTION_DAYS must be a positive integer")?
                .filter(|days| *days > 0),
            retention_interval_secs: env
                .optional("RETENTION_INTERVAL_SECS", "3600")
                .parse()
                .context("RETENTION_INTERVAL_SECS must be a positive integer")?,
        })
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            history_limit: self.history_limit,
            history_max_limit: self.history_max_limit,
            ingest_strict: self.ingest_strict,
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean: {other:?}")),
    }
}
