//! Configuration module for the orchestration engine
//!
//! Loads settings from TOML files with environment variable support via
//! dotenvy, providing structured configuration types with serde defaults.

use serde::{Deserialize, Serialize};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Backend API configuration
    pub backend: BackendConfig,

    /// Chain configuration
    pub chain: ChainConfig,

    /// Flow behaviour tuning
    #[serde(default)]
    pub flows: FlowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the marketplace backend API
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Expected chain id; flows abort when the wallet is on another chain
    pub id: u64,

    /// Human name used in step descriptions and error text
    #[serde(default = "default_chain_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// How long the success state stays visible before the dialog closes
    #[serde(default = "default_close_delay_ms")]
    pub close_delay_ms: u64,

    /// Skip the revalidation step entirely (useful for local development)
    #[serde(default)]
    pub skip_revalidation: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: default_close_delay_ms(),
            skip_revalidation: false,
        }
    }
}

// Default value functions
fn default_request_timeout() -> u64 {
    30
}
fn default_chain_name() -> String {
    "optimism".to_string()
}
fn default_close_delay_ms() -> u64 {
    2_000
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        if let Ok(base_url) = std::env::var("HYPERCERT_BACKEND_URL") {
            config.backend.base_url = base_url;
        }
        if let Ok(chain_id) = std::env::var("HYPERCERT_CHAIN_ID") {
            config.chain.id = chain_id.parse()?;
        }
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "https://api.hypercerts.org/v2".to_string(),
                timeout_secs: default_request_timeout(),
            },
            chain: ChainConfig {
                id: 10,
                name: default_chain_name(),
            },
            flows: FlowConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.chain.id, 10);
        assert_eq!(config.flows.close_delay_ms, 2_000);
        assert!(!config.flows.skip_revalidation);
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [backend]
            base_url = "http://localhost:4000"

            [chain]
            id = 11155111
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:4000");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.chain.id, 11155111);
        assert_eq!(config.flows.close_delay_ms, 2_000);
    }
}
