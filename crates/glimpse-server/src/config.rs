use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use tracing::info;

/// JWT secrets from sample `.env` files that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store kind '{}' (expected sqlite or memory)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub db_path: PathBuf,
    /// Only honoured by the memory store.
    pub snapshot_path: Option<PathBuf>,
    pub jwt_secret: String,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("GLIMPSE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("GLIMPSE_JWT_SECRET is unset or still a placeholder; it must match the identity provider's secret");
        }

        let store = match lookup("GLIMPSE_STORE") {
            Some(v) => v.parse::<StoreKind>().map_err(anyhow::Error::msg)?,
            None => StoreKind::Sqlite,
        };
        let port = parse_or(&lookup, "GLIMPSE_PORT", 3000)?;
        let sweep_interval_secs = parse_or(&lookup, "GLIMPSE_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_interval_secs == 0 {
            bail!("GLIMPSE_SWEEP_INTERVAL_SECS must be positive");
        }

        let snapshot_path = lookup("GLIMPSE_SNAPSHOT_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        if snapshot_path.is_some() && store != StoreKind::Memory {
            info!("GLIMPSE_SNAPSHOT_PATH is ignored by the sqlite store");
        }

        Ok(Self {
            host: lookup("GLIMPSE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            store,
            db_path: lookup("GLIMPSE_DB_PATH")
                .unwrap_or_else(|| "glimpse.db".into())
                .into(),
            snapshot_path,
            jwt_secret,
            sweep_interval_secs,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v.trim().parse().with_context(|| format!("Invalid {} value '{}'", key, v)),
        None => Ok(default),
    }
}
