//! An in-memory chain for exercising the deployer without a node

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy::{rpc::types::TransactionRequest, signers::local::PrivateKeySigner};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::{
    chain::{ChainClient, Connector, RpcFailure, TxReceipt},
    errors::DeployError,
    types::NetworkProfile,
};

/// The chain ID reported by default
pub(crate) const MOCK_CHAIN_ID: u64 = 31337;

/// The gas estimate returned for every simulation
pub(crate) const MOCK_GAS_ESTIMATE: u64 = 1_000_000;

/// What happens to the n-th transaction sent to the mock chain
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    /// Mined with success status
    Mined,
    /// Mined, but execution reverted with the given reason
    MinedReverted(String),
    /// Accepted into the mempool, never mined
    NeverMined,
    /// Rejected by the simulation preceding broadcast
    RejectedInSimulation(RpcFailure),
    /// Rejected by the node on broadcast
    RejectedOnSend(RpcFailure),
}

/// A scripted transaction
#[derive(Clone, Debug)]
struct Scripted {
    /// The hash the node reports, derived from the index when unset
    hash: Option<B256>,
    /// The fate of the transaction
    outcome: Outcome,
}

/// A transaction that has been broadcast
#[derive(Clone, Debug)]
struct Mined {
    /// The index into the script
    index: usize,
    /// The block the transaction landed in, if any
    block: Option<u64>,
    /// The created contract
    contract_address: Address,
}

/// The shared state behind every handle to one mock chain
#[derive(Debug)]
struct State {
    /// Every RPC method invoked, in order
    calls: Vec<&'static str>,
    /// How many times a connector handed out this chain
    connections: usize,
    /// The chain ID reported
    chain_id: u64,
    /// The pending nonce reported for any account
    pending_nonce: u64,
    /// The balance reported for any account
    balance: U256,
    /// The gas price reported
    gas_price: u128,
    /// The latest block
    head: u64,
    /// Blocks mined on top of every included transaction
    extra_blocks: u64,
    /// The fate of each transaction, by submission order
    script: Vec<Scripted>,
    /// Every accepted transaction, by submission order
    submitted: Vec<TransactionRequest>,
    /// Broadcast transactions by hash
    mined: HashMap<B256, Mined>,
    /// Contract storage
    storage: HashMap<(Address, U256), U256>,
}

/// A handle to an in-memory chain; clones share state
#[derive(Clone, Debug)]
pub(crate) struct MockChain {
    /// The shared chain state
    state: Arc<Mutex<State>>,
    /// The account transactions are sent from
    sender: Address,
}

impl MockChain {
    /// A funded chain on which every transaction is mined immediately
    pub(crate) fn new() -> Self {
        let state = State {
            calls: Vec::new(),
            connections: 0,
            chain_id: MOCK_CHAIN_ID,
            pending_nonce: 0,
            balance: U256::from(10u128.pow(20)),
            gas_price: 1_000_000_000,
            head: 100,
            extra_blocks: 0,
            script: Vec::new(),
            submitted: Vec::new(),
            mined: HashMap::new(),
            storage: HashMap::new(),
        };

        Self { state: Arc::new(Mutex::new(state)), sender: Address::repeat_byte(0x11) }
    }

    /// Lock the shared state
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Record a call to `method`
    fn record(&self, method: &'static str) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(method);
        state
    }

    /// Set the pending nonce reported for the sender
    pub(crate) fn with_pending_nonce(self, nonce: u64) -> Self {
        self.set_pending_nonce(nonce);
        self
    }

    /// Set the pending nonce reported for the sender
    pub(crate) fn set_pending_nonce(&self, nonce: u64) {
        self.state().pending_nonce = nonce;
    }

    /// Set the chain ID reported
    pub(crate) fn with_chain_id(self, chain_id: u64) -> Self {
        self.state().chain_id = chain_id;
        self
    }

    /// Set the balance reported for the sender
    pub(crate) fn with_balance(self, balance: U256) -> Self {
        self.state().balance = balance;
        self
    }

    /// Mine this many blocks on top of each included transaction
    pub(crate) fn with_extra_blocks(self, blocks: u64) -> Self {
        self.state().extra_blocks = blocks;
        self
    }

    /// Script the next transaction's fate
    pub(crate) fn then(self, outcome: Outcome) -> Self {
        self.state().script.push(Scripted { hash: None, outcome });
        self
    }

    /// Script the next transaction's fate and hash
    pub(crate) fn then_with_hash(self, hash: B256, outcome: Outcome) -> Self {
        self.state().script.push(Scripted { hash: Some(hash), outcome });
        self
    }

    /// Forget the scripted outcomes; later transactions are mined
    pub(crate) fn clear_script(&self) {
        self.state().script.clear();
    }

    /// Write a storage slot
    pub(crate) fn set_storage(&self, address: Address, slot: U256, value: U256) {
        self.state().storage.insert((address, slot), value);
    }

    /// The same chain, seen from another account
    pub(crate) fn as_sender(&self, sender: Address) -> Self {
        Self { state: self.state.clone(), sender }
    }

    /// How many times `method` was invoked
    pub(crate) fn call_count(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|m| **m == method).count()
    }

    /// How many RPC calls were made in total
    pub(crate) fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    /// How many times the chain was connected to
    pub(crate) fn connections(&self) -> usize {
        self.state().connections
    }

    /// The accepted transactions, in submission order
    pub(crate) fn submitted(&self) -> Vec<TransactionRequest> {
        self.state().submitted.clone()
    }

    /// The nonces of the accepted transactions, in submission order
    pub(crate) fn submitted_nonces(&self) -> Vec<u64> {
        self.submitted().iter().filter_map(|tx| tx.nonce).collect()
    }
}

impl State {
    /// The scripted fate of the transaction at `index`
    fn outcome(&self, index: usize) -> Outcome {
        self.script.get(index).map(|s| s.outcome.clone()).unwrap_or(Outcome::Mined)
    }

    /// The hash of the transaction at `index`
    fn hash(&self, index: usize) -> B256 {
        self.script
            .get(index)
            .and_then(|s| s.hash)
            .unwrap_or_else(|| B256::left_padding_from(&(index as u64 + 1).to_be_bytes()))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.record("eth_chainId").chain_id)
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, RpcFailure> {
        Ok(self.record("eth_getTransactionCount").pending_nonce)
    }

    async fn balance(&self, _address: Address) -> Result<U256, RpcFailure> {
        Ok(self.record("eth_getBalance").balance)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        Ok(self.record("eth_gasPrice").gas_price)
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, RpcFailure> {
        let state = self.record("eth_estimateGas");
        match state.outcome(state.submitted.len()) {
            Outcome::RejectedInSimulation(failure) => Err(failure),
            _ => Ok(MOCK_GAS_ESTIMATE),
        }
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, RpcFailure> {
        let mut state = self.record("eth_sendRawTransaction");
        let index = state.submitted.len();
        let outcome = state.outcome(index);
        if let Outcome::RejectedOnSend(failure) = outcome {
            return Err(failure);
        }

        let hash = state.hash(index);
        let nonce = tx.nonce.unwrap_or(state.pending_nonce);
        let contract_address = self.sender.create(nonce);
        let block = match outcome {
            Outcome::NeverMined => None,
            _ => {
                state.head += 1;
                let block = state.head;
                state.head += state.extra_blocks;
                Some(block)
            }
        };

        state.pending_nonce = state.pending_nonce.max(nonce + 1);
        state.submitted.push(tx);
        state.mined.insert(hash, Mined { index, block, contract_address });
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcFailure> {
        let state = self.record("eth_getTransactionReceipt");
        let Some(mined) = state.mined.get(&hash) else {
            return Ok(None);
        };
        let Some(block) = mined.block else {
            return Ok(None);
        };

        Ok(Some(TxReceipt {
            transaction_hash: hash,
            success: !matches!(state.outcome(mined.index), Outcome::MinedReverted(_)),
            contract_address: Some(mined.contract_address),
            block_number: Some(block),
            gas_used: MOCK_GAS_ESTIMATE / 2,
        }))
    }

    async fn block_number(&self) -> Result<u64, RpcFailure> {
        Ok(self.record("eth_blockNumber").head)
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, RpcFailure> {
        let state = self.record("eth_getStorageAt");
        Ok(state.storage.get(&(address, slot)).copied().unwrap_or_default())
    }

    async fn replay_revert_reason(
        &self,
        tx: &TransactionRequest,
        _block_number: u64,
    ) -> Result<Option<String>, RpcFailure> {
        let state = self.record("eth_call");
        let index = state.submitted.iter().position(|sent| sent.nonce == tx.nonce);

        Ok(index.and_then(|index| match state.outcome(index) {
            Outcome::MinedReverted(reason) => Some(reason),
            _ => None,
        }))
    }
}

/// A connector handing out one mock chain, bound to the signer's address
#[derive(Clone, Debug)]
pub(crate) struct MockConnector {
    /// The chain handed out
    chain: MockChain,
}

impl MockConnector {
    /// Wrap `chain`
    pub(crate) fn new(chain: MockChain) -> Self {
        Self { chain }
    }
}

impl Connector for MockConnector {
    type Client = MockChain;

    fn connect(
        &self,
        _network: &NetworkProfile,
        signer: PrivateKeySigner,
    ) -> Result<MockChain, DeployError> {
        self.chain.state().connections += 1;
        Ok(self.chain.as_sender(signer.address()))
    }
}
