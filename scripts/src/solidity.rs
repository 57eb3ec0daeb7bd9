//! Definitions of Solidity interfaces used during deployment

use alloy_sol_types::sol;

sol! {
    /// The subset of OpenZeppelin's `ERC1967Proxy` needed to deploy it
    contract ERC1967Proxy {
        constructor(address implementation, bytes memory _data) payable;
    }
}
