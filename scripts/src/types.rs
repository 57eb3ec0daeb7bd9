//! Type definitions used throughout the scripts

use alloy::json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::secret::SigningKey;

/// The connection and signing parameters of one target network
#[derive(Debug)]
pub struct NetworkProfile {
    /// The network's name, as used on the command line and in the journal
    pub name: String,
    /// The JSON-RPC endpoint
    pub rpc_endpoint: Url,
    /// The chain ID the endpoint must report, if pinned
    pub chain_id: Option<u64>,
    /// The deployer's signing key
    pub signing_key: SigningKey,
    /// A fixed gas price in wei; the network's fee estimation is used when unset
    pub gas_price_override: Option<u128>,
}

/// A compiled contract, as read from the build artifact store
#[derive(Clone, Debug)]
pub struct BuildArtifact {
    /// The name of the contract
    pub contract_name: String,
    /// The contract's ABI
    pub abi: JsonAbi,
    /// The contract's creation bytecode
    pub bytecode: Bytes,
}

/// The outcome of a successful upgradeable proxy deployment.
///
/// Values are only produced by the deployer, after it has observed a
/// successful receipt for the proxy creation transaction, or read back from
/// the journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// The address of the proxy, i.e. the address users interact with
    proxy_address: Address,
    /// The address of the implementation contract behind the proxy
    implementation_address: Address,
    /// The hash of the proxy creation transaction
    transaction_hash: B256,
    /// The number of confirmations observed for the proxy creation transaction
    block_confirmations: u64,
}

impl DeploymentResult {
    /// Assemble a result once the proxy receipt is in hand
    pub(crate) fn new(
        proxy_address: Address,
        implementation_address: Address,
        transaction_hash: B256,
        block_confirmations: u64,
    ) -> Self {
        Self { proxy_address, implementation_address, transaction_hash, block_confirmations }
    }

    /// The address of the proxy
    pub fn proxy_address(&self) -> Address {
        self.proxy_address
    }

    /// The address of the implementation contract
    pub fn implementation_address(&self) -> Address {
        self.implementation_address
    }

    /// The hash of the proxy creation transaction
    pub fn transaction_hash(&self) -> B256 {
        self.transaction_hash
    }

    /// The number of confirmations observed for the proxy creation transaction
    pub fn block_confirmations(&self) -> u64 {
        self.block_confirmations
    }
}

/// The stage a deployment reached, as persisted in the journal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum DeploymentStage {
    /// The implementation is confirmed on-chain; the proxy is not yet deployed
    ImplementationDeployed {
        /// The address of the implementation contract
        implementation_address: Address,
        /// The hash of the implementation creation transaction
        transaction_hash: B256,
    },
    /// The proxy is confirmed on-chain
    Completed(DeploymentResult),
}

/// A single line of the deployment journal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The name of the network deployed to
    pub network: String,
    /// The name of the deployed contract
    pub contract: String,
    /// The chain ID reported by the network at deployment time
    pub chain_id: u64,
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
    /// The stage reached
    #[serde(flatten)]
    pub stage: DeploymentStage,
}

impl DeploymentRecord {
    /// Create a record stamped with the current time
    pub fn now(network: &str, contract: &str, chain_id: u64, stage: DeploymentStage) -> Self {
        Self {
            network: network.to_string(),
            contract: contract.to_string(),
            chain_id,
            recorded_at: Utc::now(),
            stage,
        }
    }
}

/// The implementation half of an interrupted deployment, from which the
/// proxy step can be resumed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployedImplementation {
    /// The address of the implementation contract
    pub address: Address,
    /// The hash of the implementation creation transaction
    pub transaction_hash: B256,
}
