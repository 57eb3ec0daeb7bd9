//! Scripts for deploying contracts behind ERC1967 upgradeable proxies on any
//! configured EVM network.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod chain;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod deployer;
pub mod errors;
pub mod journal;
pub mod nonce;
pub mod secret;
mod solidity;
pub mod types;
pub mod utils;

#[cfg(test)]
mod mock;
