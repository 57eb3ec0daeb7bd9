//! Definitions of errors that can occur during the execution of the deploy scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use alloy_primitives::B256;

use crate::chain::RpcFailure;

/// Process exit code for configuration errors
pub const EXIT_CONFIGURATION: u8 = 1;
/// Process exit code for network and timeout errors
pub const EXIT_NETWORK: u8 = 2;
/// Process exit code for an underfunded deployer
pub const EXIT_INSUFFICIENT_FUNDS: u8 = 3;
/// Process exit code for reverted contract execution
pub const EXIT_CONTRACT_REVERT: u8 = 4;
/// Process exit code for deployment journal I/O errors
pub const EXIT_JOURNAL: u8 = 5;

/// Errors that can occur while deploying a contract behind an upgradeable proxy.
///
/// Every variant that can arise after the network has been touched carries the
/// name of the target network and, when a transaction was already broadcast,
/// its hash, so that an operator can investigate without re-running anything.
#[derive(Debug)]
pub enum DeployError {
    /// Missing or invalid configuration, key, or artifact. Raised before any
    /// RPC call is issued
    Configuration(String),
    /// The deployer account cannot pay for the transaction
    InsufficientFunds {
        /// The target network
        network: String,
        /// The transaction hash, if the transaction was broadcast
        tx_hash: Option<B256>,
        /// The underlying message
        message: String,
    },
    /// The RPC endpoint is unreachable or returned a malformed response
    Network {
        /// The target network
        network: String,
        /// The transaction hash, if the transaction was broadcast
        tx_hash: Option<B256>,
        /// The underlying message
        message: String,
    },
    /// A transaction was not confirmed within the configured bound
    Timeout {
        /// The target network
        network: String,
        /// The hash of the unconfirmed transaction
        tx_hash: B256,
        /// How long the deployer waited
        waited: Duration,
    },
    /// On-chain execution reverted
    ContractRevert {
        /// The target network
        network: String,
        /// The transaction hash, if the revert happened after broadcast
        tx_hash: Option<B256>,
        /// The revert reason, verbatim
        reason: String,
    },
    /// Error reading or appending to the deployment journal
    Journal(String),
}

impl DeployError {
    /// Classify a failed RPC request against `network`
    pub(crate) fn from_rpc(network: &str, tx_hash: Option<B256>, failure: RpcFailure) -> Self {
        let network = network.to_string();
        match failure {
            RpcFailure::Transport(message) => DeployError::Network { network, tx_hash, message },
            RpcFailure::InsufficientFunds(message) => {
                DeployError::InsufficientFunds { network, tx_hash, message }
            }
            RpcFailure::Reverted(reason) => DeployError::ContractRevert { network, tx_hash, reason },
        }
    }

    /// The transaction hash associated with the failure, if any
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            DeployError::InsufficientFunds { tx_hash, .. }
            | DeployError::Network { tx_hash, .. }
            | DeployError::ContractRevert { tx_hash, .. } => *tx_hash,
            DeployError::Timeout { tx_hash, .. } => Some(*tx_hash),
            DeployError::Configuration(_) | DeployError::Journal(_) => None,
        }
    }

    /// The process exit code encoding this error's category
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::Configuration(_) => EXIT_CONFIGURATION,
            DeployError::Network { .. } | DeployError::Timeout { .. } => EXIT_NETWORK,
            DeployError::InsufficientFunds { .. } => EXIT_INSUFFICIENT_FUNDS,
            DeployError::ContractRevert { .. } => EXIT_CONTRACT_REVERT,
            DeployError::Journal(_) => EXIT_JOURNAL,
        }
    }
}

/// Formats the optional transaction hash suffix of an error message
struct TxSuffix(Option<B256>);

impl Display for TxSuffix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(hash) => write!(f, " (tx {hash})"),
            None => Ok(()),
        }
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Configuration(s) => write!(f, "configuration error: {}", s),
            DeployError::InsufficientFunds { network, tx_hash, message } => write!(
                f,
                "insufficient funds on {}{}: {}",
                network,
                TxSuffix(*tx_hash),
                message
            ),
            DeployError::Network { network, tx_hash, message } => {
                write!(f, "network error on {}{}: {}", network, TxSuffix(*tx_hash), message)
            }
            DeployError::Timeout { network, tx_hash, waited } => write!(
                f,
                "timed out on {} after {}s waiting for tx {} to confirm; it may still be pending",
                network,
                waited.as_secs(),
                tx_hash
            ),
            DeployError::ContractRevert { network, tx_hash, reason } => {
                write!(f, "contract reverted on {}{}: {}", network, TxSuffix(*tx_hash), reason)
            }
            DeployError::Journal(s) => write!(f, "error accessing deployment journal: {}", s),
        }
    }
}

impl Error for DeployError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        let network = || "linea".to_string();
        let cases = [
            (DeployError::Configuration("x".into()), 1),
            (
                DeployError::Network { network: network(), tx_hash: None, message: "x".into() },
                2,
            ),
            (
                DeployError::Timeout {
                    network: network(),
                    tx_hash: B256::ZERO,
                    waited: Duration::from_secs(1),
                },
                2,
            ),
            (
                DeployError::InsufficientFunds {
                    network: network(),
                    tx_hash: None,
                    message: "x".into(),
                },
                3,
            ),
            (
                DeployError::ContractRevert { network: network(), tx_hash: None, reason: "x".into() },
                4,
            ),
            (DeployError::Journal("x".into()), 5),
        ];

        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "{err}");
        }
    }

    #[test]
    fn test_display_carries_context() {
        let hash = B256::repeat_byte(0xbb);
        let err = DeployError::from_rpc(
            "blastSepolia",
            Some(hash),
            RpcFailure::Reverted("Initializable: contract is already initialized".into()),
        );

        let msg = err.to_string();
        assert!(msg.contains("blastSepolia"));
        assert!(msg.contains(&hash.to_string()));
        assert!(msg.ends_with("Initializable: contract is already initialized"));
        assert_eq!(err.tx_hash(), Some(hash));
    }
}
