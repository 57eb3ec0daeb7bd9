//! The deployer's signing key, held as a scoped secret

use std::fmt;

use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

use crate::errors::DeployError;

/// A hex-encoded secp256k1 private key.
///
/// The backing buffer is wiped when the value is dropped. The type is not
/// `Clone` or `Serialize`, and its `Debug` output is redacted.
pub struct SigningKey(Zeroizing<String>);

impl SigningKey {
    /// Wrap a raw key string, taking ownership of it
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Zeroizing::new(raw.into()))
    }

    /// Read the key from the given environment variable, yielding an empty
    /// key if it is unset
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).unwrap_or_default())
    }

    /// Whether the key is absent
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parse the key into a local transaction signer
    pub(crate) fn to_signer(&self) -> Result<PrivateKeySigner, DeployError> {
        if self.is_empty() {
            return Err(DeployError::Configuration("signing key is missing or empty".to_string()));
        }

        // The parse error must not surface, it may echo key material
        self.0
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|_| DeployError::Configuration("signing key is not a valid private key".to_string()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}
