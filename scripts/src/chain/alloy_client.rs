//! A [`ChainClient`] backed by an alloy HTTP provider

use alloy::{
    eips::BlockId,
    network::EthereumWallet,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::TransportError,
};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{Revert, SolError};
use async_trait::async_trait;
use tracing::debug;

use super::{ChainClient, Connector, RpcFailure, TxReceipt};
use crate::{errors::DeployError, types::NetworkProfile};

/// The prefix geth-style nodes put in front of revert messages
const EXECUTION_REVERTED: &str = "execution reverted";

/// Connects to networks over HTTP JSON-RPC
#[derive(Clone, Copy, Debug, Default)]
pub struct AlloyConnector;

impl Connector for AlloyConnector {
    type Client = AlloyClient;

    fn connect(
        &self,
        network: &NetworkProfile,
        signer: PrivateKeySigner,
    ) -> Result<AlloyClient, DeployError> {
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);

        // Nonces are always set by the deployer, the recommended fillers only
        // complete gas and fee fields it leaves empty
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(network.rpc_endpoint.clone())
            .erased();

        debug!(network = %network.name, endpoint = %network.rpc_endpoint, %sender, "connected");
        Ok(AlloyClient { provider, sender })
    }
}

/// A signing HTTP client for a single network
#[derive(Clone, Debug)]
pub struct AlloyClient {
    /// The type-erased provider, with the signer's wallet attached
    provider: DynProvider,
    /// The signer's address
    sender: Address,
}

#[async_trait]
impl ChainClient for AlloyClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        self.provider.get_chain_id().await.map_err(classify)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, RpcFailure> {
        self.provider.get_transaction_count(address).pending().await.map_err(classify)
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcFailure> {
        self.provider.get_balance(address).await.map_err(classify)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        self.provider.get_gas_price().await.map_err(classify)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, RpcFailure> {
        self.provider.estimate_gas(tx.clone()).await.map_err(classify)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, RpcFailure> {
        let pending = self.provider.send_transaction(tx).await.map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcFailure> {
        let receipt = self.provider.get_transaction_receipt(hash).await.map_err(classify)?;

        Ok(receipt.map(|receipt| TxReceipt {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status(),
            contract_address: receipt.contract_address,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }))
    }

    async fn block_number(&self) -> Result<u64, RpcFailure> {
        self.provider.get_block_number().await.map_err(classify)
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, RpcFailure> {
        self.provider.get_storage_at(address, slot).await.map_err(classify)
    }

    async fn replay_revert_reason(
        &self,
        tx: &TransactionRequest,
        block_number: u64,
    ) -> Result<Option<String>, RpcFailure> {
        // Replay against the parent block's state, where the transaction ran
        let block = BlockId::number(block_number.saturating_sub(1));
        match self.provider.call(tx.clone()).block(block).await.map_err(classify) {
            Ok(_) => Ok(None),
            Err(RpcFailure::Reverted(reason)) => Ok(Some(reason)),
            Err(e) => Err(e),
        }
    }
}

/// Sort a transport error into the categories the deployer distinguishes
fn classify(err: TransportError) -> RpcFailure {
    let Some(payload) = err.as_error_resp() else {
        return RpcFailure::Transport(err.to_string());
    };

    let message = payload.message.to_string();
    if message.to_lowercase().contains("insufficient funds") {
        return RpcFailure::InsufficientFunds(message);
    }

    if let Some(data) = payload.as_revert_data() {
        if let Ok(revert) = Revert::abi_decode(&data) {
            return RpcFailure::Reverted(revert.reason);
        }
    }

    if message.starts_with(EXECUTION_REVERTED) {
        let reason = message
            .strip_prefix(EXECUTION_REVERTED)
            .map(|rest| rest.trim_start_matches(':').trim())
            .filter(|rest| !rest.is_empty())
            .unwrap_or(EXECUTION_REVERTED);
        return RpcFailure::Reverted(reason.to_string());
    }

    RpcFailure::Transport(format!("rpc error {}: {}", payload.code, message))
}

#[cfg(test)]
mod tests {
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::transports::RpcError;

    use super::*;

    /// Build an error response as a node would return it
    fn error_resp(code: i64, message: &'static str) -> TransportError {
        RpcError::ErrorResp(ErrorPayload { code, message: message.into(), data: None })
    }

    #[test]
    fn test_classify_insufficient_funds() {
        let err = error_resp(-32000, "insufficient funds for gas * price + value");
        assert!(matches!(classify(err), RpcFailure::InsufficientFunds(_)));
    }

    #[test]
    fn test_classify_revert_message() {
        let err = error_resp(3, "execution reverted: Initializable: contract is already initialized");
        assert_eq!(
            classify(err),
            RpcFailure::Reverted("Initializable: contract is already initialized".to_string())
        );
    }

    #[test]
    fn test_classify_bare_revert() {
        let err = error_resp(3, "execution reverted");
        assert_eq!(classify(err), RpcFailure::Reverted("execution reverted".to_string()));
    }

    #[test]
    fn test_classify_other_rpc_error() {
        let err = error_resp(-32601, "method not found");
        assert!(matches!(classify(err), RpcFailure::Transport(msg) if msg.contains("-32601")));
    }
}
