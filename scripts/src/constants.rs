//! Constants used in the deploy scripts

use alloy_primitives::{b256, B256};

/// The default path of the deployment configuration file
pub const DEFAULT_CONFIG_PATH: &str = "deploy.toml";

/// The environment variable consulted for the config file path
pub const CONFIG_PATH_ENV_VAR: &str = "DEPLOY_CONFIG";

/// The environment variable holding a network's signing key, unless the
/// network names another one via `key_env`
pub const DEFAULT_KEY_ENV_VAR: &str = "WALLET_PRIVATE_KEY";

/// The default directory searched for compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default path of the append-only deployment journal
pub const DEFAULT_DEPLOYMENTS_FILE: &str = "deployments.jsonl";

/// The default name of the proxy contract artifact
///
/// This is OpenZeppelin's [`ERC1967Proxy`](https://docs.openzeppelin.com/contracts/5.x/api/proxy#ERC1967Proxy),
/// whose constructor takes the implementation address and the initializer calldata.
pub const DEFAULT_PROXY_CONTRACT: &str = "ERC1967Proxy";

/// The default name of the implementation's initializer function
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The default number of confirmations to wait for on each deployment transaction
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// The default bound, in seconds, on the wait for a single transaction to confirm
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// The default interval, in milliseconds, between receipt polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// The number of consecutive failed receipt polls tolerated before giving up
pub const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 5;

/// The storage slot containing the implementation address in an ERC1967 proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const IMPLEMENTATION_STORAGE_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The name of the directory holding compiler build info, never an artifact
pub const BUILD_INFO_DIR: &str = "build-info";
