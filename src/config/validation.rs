//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, decimals in range)
//! - Check chain additions are complete and endpoints parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::blockchain::registry::is_builtin_chain;
use crate::config::schema::GatewayConfig;
use crate::payments::types::parse_address;

/// Largest decimals value whose scale factor still fits in a U256.
pub const MAX_DECIMALS: u8 = 77;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    ZeroValue(&'static str),
    InvalidSender(String),
    MissingChainId(String),
    InvalidRpcUrl { chain: String, url: String },
    DecimalsOutOfRange { chain: String, decimals: u8 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ZeroValue(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::InvalidSender(value) => {
                write!(f, "sender_address '{}' is not a valid address", value)
            }
            ValidationError::MissingChainId(chain) => {
                write!(f, "chain '{}' is not built in and has no chain_id", chain)
            }
            ValidationError::InvalidRpcUrl { chain, url } => {
                write!(f, "chain '{}' has an invalid rpc url '{}'", chain, url)
            }
            ValidationError::DecimalsOutOfRange { chain, decimals } => write!(
                f,
                "chain '{}' native_decimals {} exceeds {}",
                chain, decimals, MAX_DECIMALS
            ),
        }
    }
}

/// Check a loaded configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rpc_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("rpc_timeout_secs"));
    }
    if config.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("confirmation_timeout_secs"));
    }
    if config.confirmation_poll_ms == 0 {
        errors.push(ValidationError::ZeroValue("confirmation_poll_ms"));
    }
    if config.confirmation_blocks == 0 {
        errors.push(ValidationError::ZeroValue("confirmation_blocks"));
    }
    if config.token_gas_limit == 0 {
        errors.push(ValidationError::ZeroValue("token_gas_limit"));
    }

    if let Some(sender) = &config.sender_address {
        if parse_address(sender).is_err() {
            errors.push(ValidationError::InvalidSender(sender.clone()));
        }
    }

    for (key, entry) in &config.chains {
        if entry.chain_id.is_none() && !is_builtin_chain(key) {
            errors.push(ValidationError::MissingChainId(key.clone()));
        }
        if let Some(rpc) = entry.rpc.as_deref().filter(|r| !r.is_empty()) {
            if rpc.parse::<url::Url>().is_err() {
                errors.push(ValidationError::InvalidRpcUrl {
                    chain: key.clone(),
                    url: rpc.to_string(),
                });
            }
        }
        if let Some(decimals) = entry.native_decimals {
            if decimals > MAX_DECIMALS {
                errors.push(ValidationError::DecimalsOutOfRange {
                    chain: key.clone(),
                    decimals,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
