use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// TotalEnergyMode
// ---------------------------------------------------------------------------

/// How a summary's `total_energy` figure is computed.
///
/// The upstream system summed raw watt samples and called the result
/// "energy"; that behaviour is kept as the default for compatibility.
/// `WattHours` instead integrates power over the time between consecutive
/// samples (trapezoidal), yielding true watt-hours. Average, peak and
/// sample count are identical in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalEnergyMode {
    WattSum,
    WattHours,
}

impl FromStr for TotalEnergyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "watt_sum" => Ok(Self::WattSum),
            "watt_hours" => Ok(Self::WattHours),
            other => Err(anyhow::anyhow!("unknown total energy mode: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Largest accepted ingestion batch; bigger batches are rejected whole.
    pub max_batch_size: usize,
    /// TTL for cached device metadata.
    pub device_cache_ttl: Duration,
    /// TTL for memoized per-device summaries.
    pub summary_cache_ttl: Duration,
    pub total_energy_mode: TotalEnergyMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8001")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            max_batch_size: optional("MAX_BATCH_SIZE", "1000")
                .parse()
                .context("MAX_BATCH_SIZE must be a positive integer")?,
            device_cache_ttl: Duration::from_secs(
                optional("DEVICE_CACHE_TTL_SECS", "300")
                    .parse()
                    .context("DEVICE_CACHE_TTL_SECS must be a positive integer")?,
            ),
            summary_cache_ttl: Duration::from_secs(
                optional("SUMMARY_CACHE_TTL_SECS", "30")
                    .parse()
                    .context("SUMMARY_CACHE_TTL_SECS must be a positive integer")?,
            ),
            total_energy_mode: optional("TOTAL_ENERGY_MODE", "watt_sum")
                .parse()
                .context("TOTAL_ENERGY_MODE must be 'watt_sum' or 'watt_hours'")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
