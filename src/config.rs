use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::snapshot::{DEFAULT_BASE_URL, PollPolicy};

const DEFAULT_DATASET_ID: &str = "gd_m7aof0k82r803d5bjm";
const DEFAULT_TARGET_URL: &str = "https://chatgpt.com/";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub database_url: String,
    pub provider_token: String,
    pub provider_base_url: String,
    pub dataset_id: String,
    pub target_url: String,
    pub poll: PollPolicy,
    /// Upper bound for a whole `/api/query` request
    pub request_timeout: Duration,
    pub snapshot_output_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let provider_token = lookup("BRIGHTDATA_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| AppError::ConfigError("BRIGHTDATA_TOKEN must be set".to_string()))?;

        let host = var("HOST", "127.0.0.1");
        let port = var("PORT", "3000");
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: secs(&lookup, "POLL_INTERVAL_SECS", defaults.interval)?,
            timeout: secs(&lookup, "POLL_TIMEOUT_SECS", defaults.timeout)?,
            transport_retries: number(&lookup, "POLL_TRANSPORT_RETRIES", defaults.transport_retries)?,
            retry_backoff: defaults.retry_backoff,
        };
        if poll.interval.is_zero() {
            return Err(AppError::ConfigError(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            database_url: var("DATABASE_URL", "sqlite://snapshots.db?mode=rwc"),
            provider_token,
            provider_base_url: var("PROVIDER_BASE_URL", DEFAULT_BASE_URL),
            dataset_id: var("DATASET_ID", DEFAULT_DATASET_ID),
            target_url: var("TARGET_URL", DEFAULT_TARGET_URL),
            request_timeout: secs(&lookup, "REQUEST_TIMEOUT_SECS", poll.timeout + Duration::from_secs(60))?,
            poll,
            snapshot_output_file: lookup("SNAPSHOT_OUTPUT_FILE")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }
}

fn number<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

fn secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    number(lookup, key, default.as_secs()).map(Duration::from_secs)
}
