//! Server configuration.
//!
//! Identifies the server during `initialize` and selects the collaborator
//! re-authentication policy. Configuration is loaded from environment
//! variables with defaults suitable for local development.

use crate::clients::ReauthPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Protocol revision reported by default.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is empty.
    #[error("Missing required configuration value: {0}")]
    Missing(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported in `serverInfo`.
    pub name: String,

    /// Server version reported in `serverInfo`.
    pub version: String,

    /// Protocol revision reported by `initialize`.
    pub protocol_version: String,

    /// When cached collaborators are re-authenticated.
    ///
    /// Applied to the server's client manager, which may be shared.
    pub reauth_policy: ReauthPolicy,

    /// Optional usage instructions for the client.
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "toolgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            reauth_policy: ReauthPolicy::default(),
            instructions: None,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the given identity and default settings.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MCP_SERVER_NAME`: server name (default: toolgate)
    /// - `MCP_SERVER_VERSION`: server version (default: crate version)
    /// - `MCP_PROTOCOL_VERSION`: protocol revision (default: 2024-11-05)
    /// - `MCP_REAUTH_POLICY`: `until-authenticated` or `every-resolution`
    ///   (default: until-authenticated)
    /// - `MCP_INSTRUCTIONS`: usage instructions
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        Self {
            name: lookup("MCP_SERVER_NAME").unwrap_or(default.name),
            version: lookup("MCP_SERVER_VERSION").unwrap_or(default.version),
            protocol_version: lookup("MCP_PROTOCOL_VERSION").unwrap_or(default.protocol_version),
            reauth_policy: lookup("MCP_REAUTH_POLICY")
                .and_then(|s| match s.parse() {
                    Ok(policy) => Some(policy),
                    Err(e) => {
                        warn!(error = %e, "Ignoring MCP_REAUTH_POLICY");
                        None
                    }
                })
                .unwrap_or(default.reauth_policy),
            instructions: lookup("MCP_INSTRUCTIONS").filter(|s| !s.trim().is_empty()),
        }
    }

    /// Set the re-authentication policy.
    pub fn with_reauth_policy(mut self, policy: ReauthPolicy) -> Self {
        self.reauth_policy = policy;
        self
    }

    /// Set usage instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Validate that the server can identify itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Missing("MCP_SERVER_NAME".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError::Missing("MCP_SERVER_VERSION".to_string()));
        }
        if self.protocol_version.trim().is_empty() {
            return Err(ConfigError::Missing("MCP_PROTOCOL_VERSION".to_string()));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                key: "MCP_SERVER_NAME".to_string(),
                message: "must not contain whitespace".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.name, "toolgate");
        assert_eq!(config.protocol_version, "2024-11-05");
        assert_eq!(config.reauth_policy, ReauthPolicy::UntilAuthenticated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("MCP_SERVER_NAME", "calculator"),
            ("MCP_REAUTH_POLICY", "every_resolution"),
            ("MCP_INSTRUCTIONS", "Use the add tool"),
        ]));
        assert_eq!(config.name, "calculator");
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.reauth_policy, ReauthPolicy::EveryResolution);
        assert_eq!(config.instructions.as_deref(), Some("Use the add tool"));
    }

    #[test]
    fn test_bad_policy_falls_back() {
        let config = ServerConfig::from_lookup(lookup(&[("MCP_REAUTH_POLICY", "sometimes")]));
        assert_eq!(config.reauth_policy, ReauthPolicy::UntilAuthenticated);
    }

    #[test]
    fn test_validate() {
        let mut config = ServerConfig::new("", "1.0.0");
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("MCP_SERVER_NAME".to_string()))
        );

        config.name = "my server".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.name = "calculator".to_string();
        assert!(config.validate().is_ok());
    }
}
