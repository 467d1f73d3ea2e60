//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration for the transaction gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Operating mode; controls how much error detail leaves the engine.
    pub mode: OperatingMode,

    /// Default sender used for nonce lookup and gas estimation.
    pub sender_address: Option<String>,

    /// Timeout for a single RPC round trip in seconds.
    pub rpc_timeout_secs: u64,

    /// Timeout for the whole wait-for-mining phase in seconds.
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub confirmation_poll_ms: u64,

    /// Number of blocks required for a transaction to count as confirmed (1 = mined).
    pub confirmation_blocks: u32,

    /// Gas limit used for token transfers when estimation fails.
    pub token_gas_limit: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Per-chain overrides and additions, keyed by chain key.
    pub chains: BTreeMap<String, ChainEntry>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Production,
            sender_address: None,
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 120,
            confirmation_poll_ms: 2000,
            confirmation_blocks: 1,
            token_gas_limit: 65_000,
            observability: ObservabilityConfig::default(),
            chains: BTreeMap::new(),
        }
    }
}

/// Whether internal error detail may be attached to results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    #[default]
    Production,
    Development,
}

impl OperatingMode {
    /// Returns true when raw error text may be exposed to callers.
    pub fn exposes_details(self) -> bool {
        matches!(self, OperatingMode::Development)
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(OperatingMode::Production),
            "development" | "dev" => Ok(OperatingMode::Development),
            other => Err(format!("unknown operating mode '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Chain definition as written in the config file.
///
/// Every field is optional so that an entry can patch a built-in chain
/// (for example only setting `rpc`). Entries for chains that are not
/// built in must at least carry `chain_id`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainEntry {
    /// Human-readable network name.
    pub name: Option<String>,

    /// JSON-RPC endpoint URL. Wins over `rpc_env`.
    pub rpc: Option<String>,

    /// Environment variable holding the RPC endpoint.
    pub rpc_env: Option<String>,

    /// Numeric network identifier.
    pub chain_id: Option<u64>,

    /// Decimals of the native currency.
    pub native_decimals: Option<u8>,

    /// Native currency symbol.
    pub currency: Option<String>,

    /// Block explorer base URL.
    pub explorer: Option<String>,

    /// Whether this is a test network.
    pub is_testnet: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.mode, OperatingMode::Production);
        assert_eq!(config.rpc_timeout_secs, 10);
        assert_eq!(config.confirmation_timeout_secs, 120);
        assert_eq!(config.confirmation_blocks, 1);
        assert!(config.chains.is_empty());
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            mode = "development"
            rpc_timeout_secs = 3

            [chains.ethereum]
            rpc = "http://localhost:8545"

            [chains.anvil]
            chain_id = 31337
            currency = "ETH"
            "#,
        )
        .unwrap();

        assert!(config.mode.exposes_details());
        assert_eq!(config.rpc_timeout_secs, 3);
        assert_eq!(config.confirmation_poll_ms, 2000);
        assert_eq!(
            config.chains["ethereum"].rpc.as_deref(),
            Some("http://localhost:8545")
        );
        assert_eq!(config.chains["anvil"].chain_id, Some(31337));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("DEV".parse::<OperatingMode>(), Ok(OperatingMode::Development));
        assert_eq!("production".parse::<OperatingMode>(), Ok(OperatingMode::Production));
        assert!("staging".parse::<OperatingMode>().is_err());
    }
}
