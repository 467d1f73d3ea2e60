//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the operating mode.
pub const MODE_ENV_VAR: &str = "GATEWAY_MODE";

/// Environment variable overriding the default sender address.
pub const SENDER_ENV_VAR: &str = "GATEWAY_SENDER_ADDRESS";

/// Older name for the sender variable, read when the new one is unset.
pub const LEGACY_SENDER_ENV_VAR: &str = "WALLET_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env(e) => write!(f, "Environment error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply process environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            parse_config(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse TOML text into a configuration without touching the environment.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Apply `GATEWAY_*` overrides using the supplied variable lookup.
///
/// `WALLET_ADDRESS` still sets the sender when `GATEWAY_SENDER_ADDRESS` is
/// unset. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mode) = env(MODE_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.mode = mode.parse().map_err(ConfigError::Env)?;
    }
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());
    if let Some(sender) = non_empty(SENDER_ENV_VAR).or_else(|| non_empty(LEGACY_SENDER_ENV_VAR)) {
        config.sender_address = Some(sender.trim().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::OperatingMode;

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            MODE_ENV_VAR => Some("development".to_string()),
            SENDER_ENV_VAR => Some(" 0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266 ".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.mode, OperatingMode::Development);
        assert_eq!(
            config.sender_address.as_deref(),
            Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[test]
    fn test_legacy_sender_env() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            LEGACY_SENDER_ENV_VAR => Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            config.sender_address.as_deref(),
            Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8")
        );

        apply_env_overrides(&mut config, |key| match key {
            SENDER_ENV_VAR => Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string()),
            LEGACY_SENDER_ENV_VAR => Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            config.sender_address.as_deref(),
            Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[test]
    fn test_bad_mode_env() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, |key| {
            (key == MODE_ENV_VAR).then(|| "staging".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("tx_gateway_loader_test.toml");
        fs::write(&path, "confirmation_blocks = 2\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.confirmation_blocks, 2);

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("rpc_timeout_secs = \"ten\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
