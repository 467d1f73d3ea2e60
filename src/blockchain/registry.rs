//! Static table of supported chains.
//!
//! The table is assembled once at startup from the built-in chain list,
//! config-file entries and RPC endpoints found in the environment. It is
//! read-only afterwards and looked up by case-insensitive key.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::blockchain::types::{GatewayError, GatewayResult};
use crate::config::schema::{ChainEntry, GatewayConfig};

/// Immutable per-chain network parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Lower-cased registry key (e.g. "ethereum").
    pub id: String,
    pub display_name: String,
    /// JSON-RPC endpoint; `None` means the chain is known but unusable.
    #[serde(skip)]
    pub rpc_endpoint: Option<String>,
    pub chain_id: u64,
    pub native_decimals: u8,
    pub currency_symbol: String,
    pub explorer: Option<String>,
    pub is_testnet: bool,
}

impl ChainConfig {
    /// The RPC endpoint, if one is set and non-empty.
    pub fn endpoint(&self) -> Option<&str> {
        self.rpc_endpoint.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// A chain is usable only when it has an endpoint.
    pub fn is_configured(&self) -> bool {
        self.endpoint().is_some()
    }
}

struct BuiltinChain {
    key: &'static str,
    name: &'static str,
    rpc_env: &'static str,
    chain_id: u64,
    currency: &'static str,
    explorer: &'static str,
    is_testnet: bool,
}

const BUILTIN_CHAINS: &[BuiltinChain] = &[
    BuiltinChain {
        key: "ethereum",
        name: "Ethereum Mainnet",
        rpc_env: "ETH_RPC",
        chain_id: 1,
        currency: "ETH",
        explorer: "https://etherscan.io",
        is_testnet: false,
    },
    BuiltinChain {
        key: "polygon",
        name: "Polygon",
        rpc_env: "POLY_RPC",
        chain_id: 137,
        currency: "MATIC",
        explorer: "https://polygonscan.com",
        is_testnet: false,
    },
    BuiltinChain {
        key: "bsc",
        name: "BNB Smart Chain",
        rpc_env: "BSC_RPC",
        chain_id: 56,
        currency: "BNB",
        explorer: "https://bscscan.com",
        is_testnet: false,
    },
    BuiltinChain {
        key: "avalanche",
        name: "Avalanche C-Chain",
        rpc_env: "AVAX_RPC",
        chain_id: 43114,
        currency: "AVAX",
        explorer: "https://snowtrace.io",
        is_testnet: false,
    },
    BuiltinChain {
        key: "fantom",
        name: "Fantom Opera",
        rpc_env: "FTM_RPC",
        chain_id: 250,
        currency: "FTM",
        explorer: "https://ftmscan.com",
        is_testnet: false,
    },
    BuiltinChain {
        key: "arbitrum",
        name: "Arbitrum One",
        rpc_env: "ARB_RPC",
        chain_id: 42161,
        currency: "ETH",
        explorer: "https://arbiscan.io",
        is_testnet: false,
    },
    BuiltinChain {
        key: "optimism",
        name: "Optimism",
        rpc_env: "OPT_RPC",
        chain_id: 10,
        currency: "ETH",
        explorer: "https://optimistic.etherscan.io",
        is_testnet: false,
    },
    BuiltinChain {
        key: "sepolia",
        name: "Ethereum Sepolia",
        rpc_env: "SEPOLIA_RPC",
        chain_id: 11155111,
        currency: "ETH",
        explorer: "https://sepolia.etherscan.io",
        is_testnet: true,
    },
    BuiltinChain {
        key: "mumbai",
        name: "Polygon Mumbai",
        rpc_env: "MUMBAI_RPC",
        chain_id: 80001,
        currency: "MATIC",
        explorer: "https://mumbai.polygonscan.com",
        is_testnet: true,
    },
    BuiltinChain {
        key: "bsctestnet",
        name: "BSC Testnet",
        rpc_env: "BSCTEST_RPC",
        chain_id: 97,
        currency: "tBNB",
        explorer: "https://testnet.bscscan.com",
        is_testnet: true,
    },
    BuiltinChain {
        key: "moonriver",
        name: "Moonriver",
        rpc_env: "MOONRIVER_RPC",
        chain_id: 1285,
        currency: "MOVR",
        explorer: "https://moonriver.moonscan.io",
        is_testnet: false,
    },
    BuiltinChain {
        key: "astar",
        name: "Astar",
        rpc_env: "ASTAR_RPC",
        chain_id: 592,
        currency: "ASTR",
        explorer: "https://astar.blockscout.com",
        is_testnet: false,
    },
];

/// Default decimals for EVM native currencies.
const DEFAULT_NATIVE_DECIMALS: u8 = 18;

/// Returns true if `key` names a built-in chain (case-insensitive).
pub fn is_builtin_chain(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    BUILTIN_CHAINS.iter().any(|c| c.key == key)
}

/// Read-only lookup table of chains.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<String, ChainConfig>,
}

impl ChainRegistry {
    /// Build a registry from explicit chain records.
    pub fn from_chains(chains: impl IntoIterator<Item = ChainConfig>) -> Self {
        let chains = chains
            .into_iter()
            .map(|mut c| {
                c.id = c.id.to_ascii_lowercase();
                (c.id.clone(), c)
            })
            .collect();
        Self { chains }
    }

    /// Build the registry from configuration and the process environment.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Build the registry with an explicit environment lookup.
    ///
    /// Precedence for the endpoint: `rpc` in config, then the variable named by
    /// `rpc_env` in config, then the built-in variable.
    pub fn from_config_with_env<F>(config: &GatewayConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut chains = BTreeMap::new();

        for builtin in BUILTIN_CHAINS {
            chains.insert(
                builtin.key.to_string(),
                (
                    ChainConfig {
                        id: builtin.key.to_string(),
                        display_name: builtin.name.to_string(),
                        rpc_endpoint: None,
                        chain_id: builtin.chain_id,
                        native_decimals: DEFAULT_NATIVE_DECIMALS,
                        currency_symbol: builtin.currency.to_string(),
                        explorer: Some(builtin.explorer.to_string()),
                        is_testnet: builtin.is_testnet,
                    },
                    Some(builtin.rpc_env.to_string()),
                ),
            );
        }

        for (key, entry) in &config.chains {
            let key = key.to_ascii_lowercase();
            match chains.get_mut(&key) {
                Some((chain, rpc_env)) => {
                    apply_entry(chain, entry);
                    if entry.rpc_env.is_some() {
                        *rpc_env = entry.rpc_env.clone();
                    }
                }
                None => {
                    // Validation rejects additions without a chain id.
                    let Some(chain_id) = entry.chain_id else {
                        tracing::warn!(chain = %key, "Skipping chain without chain_id");
                        continue;
                    };
                    let mut chain = ChainConfig {
                        id: key.clone(),
                        display_name: key.clone(),
                        rpc_endpoint: None,
                        chain_id,
                        native_decimals: DEFAULT_NATIVE_DECIMALS,
                        currency_symbol: "ETH".to_string(),
                        explorer: None,
                        is_testnet: false,
                    };
                    apply_entry(&mut chain, entry);
                    chains.insert(key, (chain, entry.rpc_env.clone()));
                }
            }
        }

        let chains = chains
            .into_iter()
            .map(|(key, (mut chain, rpc_env))| {
                if chain.rpc_endpoint.is_none() {
                    chain.rpc_endpoint = rpc_env
                        .and_then(|var| env(&var))
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty());
                }
                (key, chain)
            })
            .collect();

        let registry = Self { chains };
        tracing::info!(
            total = registry.chains.len(),
            configured = registry.configured().count(),
            "Chain registry loaded"
        );
        registry
    }

    /// Look up a usable chain by case-insensitive key.
    ///
    /// Unknown keys and chains without an endpoint both fail with
    /// [`GatewayError::UnsupportedChain`].
    pub fn resolve(&self, chain_key: &str) -> GatewayResult<&ChainConfig> {
        let key = chain_key.trim().to_ascii_lowercase();
        match self.chains.get(&key) {
            Some(chain) if chain.is_configured() => Ok(chain),
            Some(_) => {
                tracing::debug!(chain = %key, "Chain known but has no RPC endpoint");
                Err(GatewayError::UnsupportedChain(chain_key.to_string()))
            }
            None => Err(GatewayError::UnsupportedChain(chain_key.to_string())),
        }
    }

    /// Look up a chain entry whether or not it has an endpoint.
    pub fn get(&self, chain_key: &str) -> Option<&ChainConfig> {
        self.chains.get(&chain_key.trim().to_ascii_lowercase())
    }

    /// Chains that have an RPC endpoint, ordered by key.
    pub fn configured(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values().filter(|c| c.is_configured())
    }

    /// All known chains, ordered by key.
    pub fn all(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }
}

fn apply_entry(chain: &mut ChainConfig, entry: &ChainEntry) {
    if let Some(name) = &entry.name {
        chain.display_name = name.clone();
    }
    if let Some(rpc) = &entry.rpc {
        chain.rpc_endpoint = Some(rpc.clone());
    }
    if let Some(chain_id) = entry.chain_id {
        chain.chain_id = chain_id;
    }
    if let Some(decimals) = entry.native_decimals {
        chain.native_decimals = decimals;
    }
    if let Some(currency) = &entry.currency {
        chain.currency_symbol = currency.clone();
    }
    if let Some(explorer) = &entry.explorer {
        chain.explorer = Some(explorer.clone());
    }
    if let Some(is_testnet) = entry.is_testnet {
        chain.is_testnet = is_testnet;
    }
}
