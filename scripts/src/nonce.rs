//! Per-account nonce allocation.
//!
//! Deployments that share a signing key within one process must not hand
//! the same nonce to two transactions. Each `(chain ID, account)` pair gets
//! a queue, realised as a fair async mutex over the next nonce to use: the
//! nonce is leased while a transaction is simulated and broadcast, and only
//! advanced once the node has accepted it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use alloy_primitives::Address;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::chain::{ChainClient, RpcFailure};

/// The next nonce for one account, `None` until read from the chain
type NonceSlot = Arc<AsyncMutex<Option<u64>>>;

/// Hands out nonces, serializing submissions per account
#[derive(Clone, Debug, Default)]
pub struct NonceManager {
    /// The per-account slots, keyed by chain ID and account
    slots: Arc<Mutex<HashMap<(u64, Address), NonceSlot>>>,
}

impl NonceManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `account`'s nonce on `chain_id`.
    ///
    /// The first lease for an account reads the pending transaction count
    /// from the chain; subsequent leases continue from the last committed
    /// nonce.
    pub async fn lease<C: ChainClient + ?Sized>(
        &self,
        client: &C,
        chain_id: u64,
        account: Address,
    ) -> Result<NonceLease, RpcFailure> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry((chain_id, account)).or_default().clone()
        };

        let guard = slot.lock_owned().await;
        let nonce = match *guard {
            Some(nonce) => nonce,
            None => {
                let nonce = client.transaction_count(account).await?;
                debug!(%account, chain_id, nonce, "synced nonce from chain");
                nonce
            }
        };

        Ok(NonceLease { guard, nonce, committed: false })
    }
}

/// Exclusive use of an account's next nonce.
///
/// Dropping the lease without committing forgets the cached value, so that
/// the next lease resynchronises with the chain.
#[derive(Debug)]
pub struct NonceLease {
    /// The held slot
    guard: OwnedMutexGuard<Option<u64>>,
    /// The leased nonce
    nonce: u64,
    /// Whether the nonce was consumed
    committed: bool,
}

impl NonceLease {
    /// The leased nonce
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Mark the nonce as consumed by a broadcast transaction and release the account
    pub fn commit(mut self) {
        *self.guard = Some(self.nonce + 1);
        self.committed = true;
    }
}

impl Drop for NonceLease {
    fn drop(&mut self) {
        if !self.committed {
            *self.guard = None;
        }
    }
}
