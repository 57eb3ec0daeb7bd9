//! Deployment of a contract behind an ERC1967 upgradeable proxy.
//!
//! A deployment is two transactions: the implementation contract is created
//! first, then a proxy pointing at it, whose constructor delegates the
//! initializer call to the implementation. Each transaction is simulated,
//! funded, broadcast and awaited before the next one starts. When a journal
//! is attached, the implementation is recorded as soon as it is confirmed so
//! that a failed proxy step can be resumed without redeploying it.

use std::time::Duration;

use alloy::{network::TransactionBuilder, rpc::types::TransactionRequest};
use alloy_primitives::{Address, Bytes, B256, U256};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::{
    chain::{ChainClient, Connector, RpcFailure, TxReceipt},
    constants::{
        DEFAULT_CONFIRMATIONS, DEFAULT_INITIALIZER, DEFAULT_POLL_INTERVAL_MS,
        DEFAULT_TIMEOUT_SECS, IMPLEMENTATION_STORAGE_SLOT, MAX_CONSECUTIVE_POLL_FAILURES,
    },
    errors::DeployError,
    journal::DeploymentJournal,
    nonce::NonceManager,
    types::{
        BuildArtifact, DeployedImplementation, DeploymentRecord, DeploymentResult,
        DeploymentStage, NetworkProfile,
    },
    utils::{address_from_slot, initializer_calldata, proxy_creation_code, validate_implementation},
};

/// The reason reported for a reverted transaction whose replay yields none
const UNKNOWN_REVERT_REASON: &str = "transaction reverted without a reason";

/// Tunables of a deployment
#[derive(Clone, Debug)]
pub struct DeployOptions {
    /// Confirmations to wait for on each transaction; zero is treated as one
    pub confirmations: u64,
    /// The bound on the wait for each transaction to confirm
    pub max_wait: Duration,
    /// The interval between receipt polls
    pub poll_interval: Duration,
    /// The initializer invoked through the proxy
    pub initializer: String,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            max_wait: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            initializer: DEFAULT_INITIALIZER.to_string(),
        }
    }
}

/// Deploys contracts behind upgradeable proxies.
///
/// A single deployer may run any number of deployments concurrently, to
/// one network or several; transactions from the same account are given
/// distinct, consecutive nonces.
#[derive(Debug)]
pub struct Deployer<K: Connector> {
    /// Opens connections to target networks
    connector: K,
    /// The proxy contract placed in front of every implementation
    proxy: BuildArtifact,
    /// Deployment tunables
    options: DeployOptions,
    /// Nonce allocation, shared by every deployment
    nonces: NonceManager,
    /// Where completed steps are recorded
    journal: Option<DeploymentJournal>,
}

/// A live connection to a network whose chain ID has been checked
struct Session<'a, C> {
    /// The target network
    network: &'a NetworkProfile,
    /// The signing client
    client: C,
    /// The chain ID the endpoint reported
    chain_id: u64,
}

impl<C: ChainClient> Session<'_, C> {
    /// Classify an RPC failure against this session's network
    fn rpc_error(&self, tx_hash: Option<B256>, failure: RpcFailure) -> DeployError {
        DeployError::from_rpc(&self.network.name, tx_hash, failure)
    }
}

/// A transaction that has been mined with enough confirmations
struct Confirmed {
    /// The created contract
    contract_address: Address,
    /// The transaction hash
    transaction_hash: B256,
    /// Confirmations observed
    confirmations: u64,
}

impl<K: Connector> Deployer<K> {
    /// Create a deployer placing `proxy` in front of each implementation
    pub fn new(connector: K, proxy: BuildArtifact, options: DeployOptions) -> Self {
        Self { connector, proxy, options, nonces: NonceManager::new(), journal: None }
    }

    /// Record deployment progress in `journal`
    pub fn with_journal(mut self, journal: DeploymentJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Share nonce allocation with other deployers
    pub fn with_nonce_manager(mut self, nonces: NonceManager) -> Self {
        self.nonces = nonces;
        self
    }

    /// The deployment tunables
    pub fn options(&self) -> &DeployOptions {
        &self.options
    }

    /// Deploy `artifact` behind a new proxy on `network`, initializing it
    /// with `init_args`.
    ///
    /// Every local precondition (key, bytecode, initializer arguments) is
    /// checked before the network is contacted.
    pub async fn deploy_upgradeable_proxy(
        &self,
        artifact: &BuildArtifact,
        network: &NetworkProfile,
        init_args: &[String],
    ) -> Result<DeploymentResult, DeployError> {
        let init_data = self.check_preconditions(artifact, init_args)?;
        let session = self.connect(network).await?;

        info!(
            network = %network.name,
            contract = %artifact.contract_name,
            chain_id = session.chain_id,
            "deploying implementation"
        );
        let implementation = self.submit_and_confirm(&session, artifact.bytecode.clone()).await?;
        info!(
            network = %network.name,
            address = %implementation.contract_address,
            tx = %implementation.transaction_hash,
            "implementation deployed"
        );

        let deployed = DeployedImplementation {
            address: implementation.contract_address,
            transaction_hash: implementation.transaction_hash,
        };
        self.record(
            &session,
            artifact,
            DeploymentStage::ImplementationDeployed {
                implementation_address: deployed.address,
                transaction_hash: deployed.transaction_hash,
            },
        )
        .map_err(|e| match e {
            DeployError::Journal(message) => DeployError::Journal(format!(
                "implementation {} (tx {}) is deployed on {} but was not recorded: {}",
                deployed.address, deployed.transaction_hash, network.name, message
            )),
            other => other,
        })?;

        self.deploy_proxy(&session, artifact, deployed, init_data).await
    }

    /// Finish a deployment whose implementation is already on-chain, by
    /// deploying and initializing the proxy only
    pub async fn resume_upgradeable_proxy(
        &self,
        artifact: &BuildArtifact,
        network: &NetworkProfile,
        init_args: &[String],
        implementation: DeployedImplementation,
    ) -> Result<DeploymentResult, DeployError> {
        let init_data = self.check_preconditions(artifact, init_args)?;
        let session = self.connect(network).await?;

        info!(
            network = %network.name,
            contract = %artifact.contract_name,
            implementation = %implementation.address,
            "resuming deployment from existing implementation"
        );
        self.deploy_proxy(&session, artifact, implementation, init_data).await
    }

    /// Validate everything that can be checked offline, returning the
    /// initializer calldata
    fn check_preconditions(
        &self,
        artifact: &BuildArtifact,
        init_args: &[String],
    ) -> Result<Bytes, DeployError> {
        validate_implementation(artifact)?;
        if self.proxy.bytecode.is_empty() {
            return Err(DeployError::Configuration(format!(
                "proxy artifact {} has empty bytecode",
                self.proxy.contract_name
            )));
        }

        initializer_calldata(&artifact.abi, &self.options.initializer, init_args)
    }

    /// Open a session on `network`, checking the chain ID it reports
    async fn connect<'a>(
        &self,
        network: &'a NetworkProfile,
    ) -> Result<Session<'a, K::Client>, DeployError> {
        let signer = network.signing_key.to_signer()?;
        let client = self.connector.connect(network, signer)?;

        let chain_id = client
            .chain_id()
            .await
            .map_err(|e| DeployError::from_rpc(&network.name, None, e))?;
        if let Some(expected) = network.chain_id {
            if expected != chain_id {
                return Err(DeployError::Configuration(format!(
                    "network {} is configured with chain ID {} but its endpoint reports {}",
                    network.name, expected, chain_id
                )));
            }
        }

        Ok(Session { network, client, chain_id })
    }

    /// Deploy the proxy in front of `implementation`, then check its
    /// implementation slot
    async fn deploy_proxy(
        &self,
        session: &Session<'_, K::Client>,
        artifact: &BuildArtifact,
        implementation: DeployedImplementation,
        init_data: Bytes,
    ) -> Result<DeploymentResult, DeployError> {
        let code = proxy_creation_code(&self.proxy, implementation.address, init_data)?;

        info!(network = %session.network.name, proxy = %self.proxy.contract_name, "deploying proxy");
        let proxy = self.submit_and_confirm(session, code).await?;
        info!(
            network = %session.network.name,
            address = %proxy.contract_address,
            tx = %proxy.transaction_hash,
            confirmations = proxy.confirmations,
            "proxy deployed"
        );

        self.verify_implementation_slot(session, proxy.contract_address, implementation.address)
            .await;

        let result = DeploymentResult::new(
            proxy.contract_address,
            implementation.address,
            proxy.transaction_hash,
            proxy.confirmations,
        );
        self.record(session, artifact, DeploymentStage::Completed(result.clone()))?;
        Ok(result)
    }

    /// Read back the proxy's implementation slot. A mismatch is reported but
    /// does not fail the deployment, the proxy transaction having succeeded
    async fn verify_implementation_slot(
        &self,
        session: &Session<'_, K::Client>,
        proxy: Address,
        implementation: Address,
    ) {
        let slot = U256::from_be_bytes(IMPLEMENTATION_STORAGE_SLOT.0);
        match session.client.storage_at(proxy, slot).await {
            Ok(word) if address_from_slot(word) == implementation => {
                debug!(%proxy, %implementation, "implementation slot verified")
            }
            Ok(word) => warn!(
                network = %session.network.name,
                %proxy,
                expected = %implementation,
                found = %address_from_slot(word),
                "proxy implementation slot does not hold the implementation address"
            ),
            Err(e) => warn!(
                network = %session.network.name,
                %proxy,
                error = ?e,
                "could not read proxy implementation slot"
            ),
        }
    }

    /// Append a record to the journal, if one is attached
    fn record(
        &self,
        session: &Session<'_, K::Client>,
        artifact: &BuildArtifact,
        stage: DeploymentStage,
    ) -> Result<(), DeployError> {
        let Some(journal) = &self.journal else {
            return Ok(());
        };

        let record = DeploymentRecord::now(
            &session.network.name,
            &artifact.contract_name,
            session.chain_id,
            stage,
        );
        journal.append(&record)
    }

    /// Broadcast a contract creation transaction and wait for it to confirm
    async fn submit_and_confirm(
        &self,
        session: &Session<'_, K::Client>,
        code: Bytes,
    ) -> Result<Confirmed, DeployError> {
        let (tx, tx_hash) = self.submit(session, code).await?;
        let (receipt, confirmations) = self.confirm(session, tx_hash).await?;

        if !receipt.success {
            let reason = self.revert_reason(session, &tx, &receipt).await;
            return Err(DeployError::ContractRevert {
                network: session.network.name.clone(),
                tx_hash: Some(tx_hash),
                reason,
            });
        }

        let predicted = tx.from.zip(tx.nonce).map(|(from, nonce)| from.create(nonce));
        let contract_address = receipt.contract_address.or(predicted).ok_or_else(|| {
            session.rpc_error(
                Some(tx_hash),
                RpcFailure::Transport("receipt carries no contract address".to_string()),
            )
        })?;

        Ok(Confirmed { contract_address, transaction_hash: tx_hash, confirmations })
    }

    /// Simulate, fund-check and broadcast a contract creation, holding the
    /// sender's nonce until the node has accepted the transaction
    async fn submit(
        &self,
        session: &Session<'_, K::Client>,
        code: Bytes,
    ) -> Result<(TransactionRequest, B256), DeployError> {
        let client = &session.client;
        let sender = client.sender();
        let rpc = |failure: RpcFailure| session.rpc_error(None, failure);

        let lease = self.nonces.lease(client, session.chain_id, sender).await.map_err(rpc)?;
        info!(
            network = %session.network.name,
            nonce = lease.nonce(),
            address = %sender.create(lease.nonce()),
            "contract will be created at"
        );
        let mut tx = TransactionRequest::default()
            .with_from(sender)
            .with_chain_id(session.chain_id)
            .with_nonce(lease.nonce())
            .with_deploy_code(code);

        let gas_price = match session.network.gas_price_override {
            Some(price) => {
                tx.set_gas_price(price);
                price
            }
            None => client.gas_price().await.map_err(rpc)?,
        };

        let gas_limit = client.estimate_gas(&tx).await.map_err(rpc)?;
        tx.set_gas_limit(gas_limit);

        let cost = U256::from(gas_limit) * U256::from(gas_price);
        let balance = client.balance(sender).await.map_err(rpc)?;
        if balance < cost {
            return Err(DeployError::InsufficientFunds {
                network: session.network.name.clone(),
                tx_hash: None,
                message: format!(
                    "{sender} holds {balance} wei, the transaction may cost up to {cost} wei"
                ),
            });
        }

        let tx_hash = client.send_transaction(tx.clone()).await.map_err(rpc)?;
        debug!(
            network = %session.network.name,
            nonce = lease.nonce(),
            tx = %tx_hash,
            gas_limit,
            "transaction sent"
        );
        lease.commit();

        Ok((tx, tx_hash))
    }

    /// Wait, within the configured bound, for `tx_hash` to be mined and
    /// confirmed. Returns the receipt with the confirmations observed
    async fn confirm(
        &self,
        session: &Session<'_, K::Client>,
        tx_hash: B256,
    ) -> Result<(TxReceipt, u64), DeployError> {
        let max_wait = self.options.max_wait;
        match timeout(max_wait, self.wait_for_receipt(session, tx_hash)).await {
            Ok(res) => res,
            Err(_) => Err(DeployError::Timeout {
                network: session.network.name.clone(),
                tx_hash,
                waited: max_wait,
            }),
        }
    }

    /// Poll for the receipt of `tx_hash` until it is mined and has enough
    /// confirmations, or until polling fails repeatedly
    async fn wait_for_receipt(
        &self,
        session: &Session<'_, K::Client>,
        tx_hash: B256,
    ) -> Result<(TxReceipt, u64), DeployError> {
        let required = self.options.confirmations.max(1);
        let mut failures = 0;

        loop {
            match poll_receipt(&session.client, tx_hash, required).await {
                Ok(Some(confirmed)) => return Ok(confirmed),
                Ok(None) => failures = 0,
                Err(failure) => {
                    failures += 1;
                    warn!(tx = %tx_hash, attempt = failures, error = ?failure, "receipt poll failed");
                    if failures >= MAX_CONSECUTIVE_POLL_FAILURES {
                        return Err(session.rpc_error(Some(tx_hash), failure));
                    }
                }
            }

            sleep(self.options.poll_interval).await;
        }
    }

    /// Recover the revert reason of a failed transaction by replaying it
    async fn revert_reason(
        &self,
        session: &Session<'_, K::Client>,
        tx: &TransactionRequest,
        receipt: &TxReceipt,
    ) -> String {
        let Some(block) = receipt.block_number else {
            return UNKNOWN_REVERT_REASON.to_string();
        };

        match session.client.replay_revert_reason(tx, block).await {
            Ok(Some(reason)) => reason,
            Ok(None) => UNKNOWN_REVERT_REASON.to_string(),
            // Some nodes report the revert as an error of the replayed call
            Err(RpcFailure::Reverted(reason)) => reason,
            Err(e) => {
                warn!(tx = %receipt.transaction_hash, error = ?e, "could not replay reverted transaction");
                UNKNOWN_REVERT_REASON.to_string()
            }
        }
    }
}

/// Fetch the receipt of `tx_hash` once it has `required` confirmations.
/// Failed receipts are returned as soon as they are mined
async fn poll_receipt<C: ChainClient>(
    client: &C,
    tx_hash: B256,
    required: u64,
) -> Result<Option<(TxReceipt, u64)>, RpcFailure> {
    let Some(receipt) = client.transaction_receipt(tx_hash).await? else {
        return Ok(None);
    };
    let Some(block) = receipt.block_number else {
        return Ok(None);
    };

    let head = client.block_number().await?;
    let confirmations = head.saturating_sub(block) + 1;
    if receipt.success && confirmations < required {
        debug!(tx = %tx_hash, confirmations, required, "waiting for confirmations");
        return Ok(None);
    }

    Ok(Some((receipt, confirmations)))
}
