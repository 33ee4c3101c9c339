use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::report_service::ErrorPolicy;

/// Which query source the engine is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Builtin,
    Definition,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "builtin" => Ok(StrategyKind::Builtin),
            "definition" => Ok(StrategyKind::Definition),
            other => Err(format!(
                "Invalid REPORT_STRATEGY: {}. Must be 'builtin' or 'definition'",
                other
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Builtin => f.write_str("builtin"),
            StrategyKind::Definition => f.write_str("definition"),
        }
    }
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub install_path: PathBuf,
    pub strategy: StrategyKind,
    /// `None` means the strategy's default policy
    pub error_policy: Option<ErrorPolicy>,
    pub query_timeout: Duration,
    pub store_ttl: Duration,
    pub store_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| "DATABASE_URL must be set".to_string())?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port: u16 = lookup("PORT")
            .unwrap_or_else(|| "8095".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let install_path =
            PathBuf::from(lookup("PMS_INSTALL_PATH").unwrap_or_else(|| "/opt/pms".to_string()));

        let strategy: StrategyKind = lookup("REPORT_STRATEGY")
            .unwrap_or_else(|| "builtin".to_string())
            .parse()?;

        let error_policy = lookup("REPORT_ERROR_POLICY")
            .map(|v| v.parse::<ErrorPolicy>())
            .transpose()?;

        let query_timeout_secs: u64 = parse_number(&lookup, "QUERY_TIMEOUT_SECS", 300)?;
        if query_timeout_secs == 0 {
            return Err("QUERY_TIMEOUT_SECS must be greater than zero".to_string());
        }

        let store_ttl_secs: u64 = parse_number(&lookup, "REPORT_STORE_TTL_SECS", 3600)?;
        let store_capacity: usize = parse_number(&lookup, "REPORT_STORE_CAPACITY", 256)?;
        if store_capacity == 0 {
            return Err("REPORT_STORE_CAPACITY must be greater than zero".to_string());
        }

        Ok(Config {
            database_url,
            host,
            port,
            install_path,
            strategy,
            error_policy,
            query_timeout: Duration::from_secs(query_timeout_secs),
            store_ttl: Duration::from_secs(store_ttl_secs),
            store_capacity,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| format!("{} must be a non-negative integer", key)),
        None => Ok(default),
    }
}
