//! Network and deployment configuration, read from a TOML file.
//!
//! ```toml
//! [networks.blastSepolia]
//! url = "https://sepolia.blast.io"
//! chain_id = 168587773
//! gas_price = 1000000000
//!
//! [deploy]
//! contract = "AMTConfig"
//! ```
//!
//! Signing keys never appear in the file: each network names the
//! environment variable its key is read from (`key_env`, by default
//! `WALLET_PRIVATE_KEY`).

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIRMATIONS, DEFAULT_DEPLOYMENTS_FILE,
        DEFAULT_INITIALIZER, DEFAULT_KEY_ENV_VAR, DEFAULT_POLL_INTERVAL_MS,
        DEFAULT_PROXY_CONTRACT, DEFAULT_TIMEOUT_SECS,
    },
    errors::DeployError,
    secret::SigningKey,
    types::NetworkProfile,
};

/// The contents of the configuration file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// The known networks, by name
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Defaults for the `deploy` command
    #[serde(default)]
    pub deploy: DeploySettings,
}

/// The configuration of a single network
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// The JSON-RPC endpoint
    pub url: Url,
    /// The chain ID the endpoint must report
    pub chain_id: Option<u64>,
    /// A fixed gas price, in wei. TOML integers are 64-bit
    pub gas_price: Option<u64>,
    /// The environment variable holding the signing key
    #[serde(default = "default_key_env")]
    pub key_env: String,
}

/// Defaults for the `deploy` command, each overridable on the command line
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploySettings {
    /// The contract to deploy behind the proxy
    pub contract: Option<String>,
    /// The initializer invoked through the proxy
    pub initializer: String,
    /// The proxy contract's artifact name
    pub proxy_contract: String,
    /// The compiler output directory
    pub artifacts_dir: String,
    /// The deployment journal
    pub deployments_file: String,
    /// Confirmations to wait for on each transaction
    pub confirmations: u64,
    /// The bound, in seconds, on the wait for each transaction
    pub timeout_secs: u64,
    /// The interval, in milliseconds, between receipt polls
    pub poll_interval_ms: u64,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            contract: None,
            initializer: DEFAULT_INITIALIZER.to_string(),
            proxy_contract: DEFAULT_PROXY_CONTRACT.to_string(),
            artifacts_dir: DEFAULT_ARTIFACTS_DIR.to_string(),
            deployments_file: DEFAULT_DEPLOYMENTS_FILE.to_string(),
            confirmations: DEFAULT_CONFIRMATIONS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl DeploySettings {
    /// The wait bound as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// The key variable used when a network names none
fn default_key_env() -> String {
    DEFAULT_KEY_ENV_VAR.to_string()
}

impl DeployConfig {
    /// Read and parse the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DeployError::Configuration(format!("error reading {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| DeployError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self, DeployError> {
        toml::from_str(contents).map_err(|e| DeployError::Configuration(e.to_string()))
    }

    /// Build the profile of `network`, reading its key from the environment
    pub fn profile(&self, network: &str) -> Result<NetworkProfile, DeployError> {
        let config = self.network(network)?;
        Ok(config.profile(network, SigningKey::from_env(&config.key_env)))
    }

    /// Look up a network by name
    pub fn network(&self, network: &str) -> Result<&NetworkConfig, DeployError> {
        self.networks.get(network).ok_or_else(|| {
            let known = self.networks.keys().cloned().collect::<Vec<_>>().join(", ");
            DeployError::Configuration(format!("unknown network {network} (known: {known})"))
        })
    }
}

impl NetworkConfig {
    /// Build a profile for this network with the given key
    pub fn profile(&self, name: &str, signing_key: SigningKey) -> NetworkProfile {
        NetworkProfile {
            name: name.to_string(),
            rpc_endpoint: self.url.clone(),
            chain_id: self.chain_id,
            signing_key,
            gas_price_override: self.gas_price.map(u128::from),
        }
    }
}
