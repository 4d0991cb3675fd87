use std::path::PathBuf;
use std::time::Duration;

use crate::dims::BlockDims;
use crate::error::{EngineError, Result};

/// Default physical-memory device on Linux.
pub const DEFAULT_DEVICE: &str = "/dev/mem";

/// Default bound on the status-word handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a physically mapped block engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedConfig {
    /// Device (or file) exposing physical memory.
    pub device: PathBuf,
    /// Physical base address of the data region.
    pub data_addr: u64,
    /// Physical base address of the status register.
    pub status_addr: u64,
    /// Native block shape of the accelerator.
    pub dims: BlockDims,
    /// Maximum time `compute` waits for the status word to change.
    pub handshake_timeout: Duration,
}

impl MappedConfig {
    /// Configuration for the canonical 16x16 accelerator behind `/dev/mem`.
    pub fn new(data_addr: u64, status_addr: u64) -> Self {
        MappedConfig {
            device: PathBuf::from(DEFAULT_DEVICE),
            data_addr,
            status_addr,
            dims: BlockDims::CANONICAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_dims(mut self, dims: BlockDims) -> Self {
        self.dims = dims;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Read a configuration from the process environment.
    ///
    /// Reads the following variables:
    /// - `BMV_DATA_ADDR` -> data_addr (required)
    /// - `BMV_STATUS_ADDR` -> status_addr (required)
    /// - `BMV_DEVICE` -> device (default `/dev/mem`)
    /// - `BMV_BLOCK_ROWS`, `BMV_BLOCK_COLS` -> dims (default 16x16)
    /// - `BMV_HANDSHAKE_TIMEOUT_MS` -> handshake_timeout (default 1000)
    ///
    /// Addresses accept decimal or `0x`-prefixed hex.
    pub fn from_env() -> Result<MappedConfig> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MappedConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<MappedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_addr = required(&lookup, "BMV_DATA_ADDR")?;
        let status_addr = required(&lookup, "BMV_STATUS_ADDR")?;
        let mut config = MappedConfig::new(data_addr, status_addr);

        if let Some(device) = lookup("BMV_DEVICE") {
            config.device = PathBuf::from(device);
        }

        let rows = optional_usize(&lookup, "BMV_BLOCK_ROWS")?.unwrap_or(16);
        let cols = optional_usize(&lookup, "BMV_BLOCK_COLS")?.unwrap_or(16);
        config.dims = BlockDims::new(rows, cols)?;

        if let Some(ms) = optional(&lookup, "BMV_HANDSHAKE_TIMEOUT_MS")? {
            config.handshake_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key)?.ok_or(EngineError::InvalidConfig {
        key,
        value: String::new(),
    })
}

fn optional<F>(lookup: &F, key: &'static str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => parse_u64(&raw)
            .map(Some)
            .ok_or(EngineError::InvalidConfig { key, value: raw }),
    }
}

fn optional_usize<F>(lookup: &F, key: &'static str) -> Result<Option<usize>>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key)? {
        None => Ok(None),
        Some(n) => usize::try_from(n).map(Some).map_err(|_| EngineError::InvalidConfig {
            key,
            value: n.to_string(),
        }),
    }
}

fn parse_u64(raw: &str) -> Option<u64> {
    let s = raw.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => s.replace('_', "").parse().ok(),
    }
}
