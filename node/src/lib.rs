use commonware_codec::DecodeExt;
use commonware_utils::{from_hex_formatted, hex};
use nexus_execution::{EngineConfig, Network};
use nexus_types::{Address, Register};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

pub mod replay;

/// Default cap on transactions read by a single replay.
pub const DEFAULT_MAX_TRANSACTIONS: usize = 10_000;

/// A register written into state before replay starts.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GenesisRegister {
    /// Hex-encoded address.
    pub address: String,
    /// Hex-encoded register.
    pub register: String,
}

/// Configuration of the replay tool.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub client_mode: bool,
    #[serde(default = "default_max_transactions")]
    pub max_transactions: usize,
    #[serde(default)]
    pub genesis_registers: Vec<GenesisRegister>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("unknown network: {value} (expected mainnet or testnet)")]
    InvalidNetwork { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: usize },
    #[error("{field} must be hex: {value}")]
    InvalidHex { field: &'static str, value: String },
    #[error("{field} is invalid: {value}")]
    InvalidDecode {
        field: &'static str,
        value: String,
        #[source]
        source: commonware_codec::Error,
    },
}

pub struct ValidatedConfig {
    pub log_level: Level,
    pub json_logs: bool,
    pub engine: EngineConfig,
    pub max_transactions: usize,
    pub genesis_registers: Vec<(Address, Register)>,
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_max_transactions() -> usize {
    DEFAULT_MAX_TRANSACTIONS
}

fn decode_hex<T: DecodeExt<()>>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    let bytes = from_hex_formatted(value).ok_or_else(|| ConfigError::InvalidHex {
        field,
        value: value.to_string(),
    })?;
    T::decode(bytes.as_slice()).map_err(|source| ConfigError::InvalidDecode {
        field,
        value: hex(&bytes),
        source,
    })
}

fn ensure_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

pub fn parse_network(value: &str) -> Result<Network, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "testnet" => Ok(Network::Testnet),
        _ => Err(ConfigError::InvalidNetwork {
            value: value.to_string(),
        }),
    }
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        ensure_nonzero("max_transactions", self.max_transactions)?;

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        let network = parse_network(&self.network)?;

        let genesis_registers = self
            .genesis_registers
            .iter()
            .map(|entry| {
                let address = decode_hex::<Address>("genesis_registers.address", &entry.address)?;
                let register =
                    decode_hex::<Register>("genesis_registers.register", &entry.register)?;
                Ok((address, register))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(ValidatedConfig {
            log_level,
            json_logs: self.json_logs,
            engine: EngineConfig {
                network,
                client_mode: self.client_mode,
            },
            max_transactions: self.max_transactions,
            genesis_registers,
        })
    }
}

#[cfg(test)]
mod tests;
