//! The deployer's view of a blockchain node.
//!
//! The deployer only needs a handful of JSON-RPC methods; they are gathered
//! in [`ChainClient`] so that the orchestration logic can be exercised
//! against an in-memory chain as well as a live endpoint.

use alloy::{rpc::types::TransactionRequest, signers::local::PrivateKeySigner};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::{errors::DeployError, types::NetworkProfile};

pub mod alloy_client;

pub use alloy_client::{AlloyClient, AlloyConnector};

/// A classified failure of a single RPC request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcFailure {
    /// The endpoint could not be reached or answered with something malformed
    Transport(String),
    /// The node rejected the request because the sender cannot pay for it
    InsufficientFunds(String),
    /// Execution reverted; holds the decoded revert reason
    Reverted(String),
}

/// The fields of a transaction receipt the deployer inspects
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    /// The transaction hash
    pub transaction_hash: B256,
    /// Whether execution succeeded
    pub success: bool,
    /// The address of the created contract, for creation transactions
    pub contract_address: Option<Address>,
    /// The block the transaction was included in
    pub block_number: Option<u64>,
    /// The gas consumed by the transaction
    pub gas_used: u64,
}

/// A connection to one network with a signer attached
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The address transactions are sent from
    fn sender(&self) -> Address;

    /// The chain ID reported by the endpoint
    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    /// The sender's next nonce, including pending transactions
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure>;

    /// The balance of `address`, in wei
    async fn balance(&self, address: Address) -> Result<U256, RpcFailure>;

    /// The network's current gas price, in wei
    async fn gas_price(&self) -> Result<u128, RpcFailure>;

    /// Simulate `tx` and return its gas estimate
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, RpcFailure>;

    /// Sign and broadcast `tx`, returning its hash
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, RpcFailure>;

    /// Fetch the receipt of a transaction, if it has been mined
    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcFailure>;

    /// The latest block number
    async fn block_number(&self) -> Result<u64, RpcFailure>;

    /// Read a storage slot of `address`
    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, RpcFailure>;

    /// Re-execute a failed transaction against the state it ran on, returning
    /// its revert reason if the node reports one
    async fn replay_revert_reason(
        &self,
        tx: &TransactionRequest,
        block_number: u64,
    ) -> Result<Option<String>, RpcFailure>;
}

/// Opens [`ChainClient`]s for network profiles
pub trait Connector: Send + Sync {
    /// The client type produced
    type Client: ChainClient;

    /// Connect to `network`, binding `signer` as the transaction signer
    fn connect(
        &self,
        network: &NetworkProfile,
        signer: PrivateKeySigner,
    ) -> Result<Self::Client, DeployError>;
}
