//! Wallet-derived symmetric keys
//!
//! A wallet key is `SHA-256(wallet_public_id || WALLET_KEY_SALT)`. It needs no
//! presence ceremony and is reproducible on any device that knows the wallet
//! address. At most one such key is held at a time.

use crate::shared::constants::{AES_KEY_SIZE, WALLET_KEY_SALT};
use crate::shared::error::SecurityError;
use crate::shared::utils::validate_wallet_address;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// 32-byte AES key derived from a wallet public identifier
#[derive(Clone)]
pub struct WalletDerivedKey {
    bytes: Zeroizing<[u8; AES_KEY_SIZE]>,
}

impl WalletDerivedKey {
    pub fn derive(wallet_public_id: &str) -> Result<Self, SecurityError> {
        validate_wallet_address(wallet_public_id)?;

        let mut hasher = Sha256::new();
        hasher.update(wallet_public_id.as_bytes());
        hasher.update(WALLET_KEY_SALT);

        let mut bytes = Zeroizing::new([0u8; AES_KEY_SIZE]);
        bytes.copy_from_slice(&hasher.finalize());
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for WalletDerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletDerivedKey(<redacted>)")
    }
}

/// Single-entry cache of the current wallet key
///
/// The address and key are replaced together; a derivation for a new address
/// evicts the previous entry.
#[derive(Default)]
pub struct WalletKeyCache {
    current: Option<(String, WalletDerivedKey)>,
}

impl WalletKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached key for `wallet_public_id`, deriving and caching it on a miss
    pub fn derive(&mut self, wallet_public_id: &str) -> Result<WalletDerivedKey, SecurityError> {
        if let Some((address, key)) = &self.current {
            if address == wallet_public_id {
                return Ok(key.clone());
            }
        }

        let key = WalletDerivedKey::derive(wallet_public_id)?;
        self.current = Some((wallet_public_id.to_string(), key.clone()));
        log::debug!("Cached wallet key for {}", wallet_public_id);
        Ok(key)
    }

    pub fn has_wallet_key(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_address(&self) -> Option<&str> {
        self.current.as_ref().map(|(address, _)| address.as_str())
    }

    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            log::debug!("Cleared cached wallet key");
        }
    }
}

impl fmt::Debug for WalletKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKeyCache")
            .field("address", &self.current_address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_matches_digest() {
        let key = WalletDerivedKey::derive("wallet-A").unwrap();
        let mut expected = Sha256::new();
        expected.update(b"wallet-A");
        expected.update(b"soulon-wallet-key-v1");
        assert_eq!(key.as_bytes().as_slice(), expected.finalize().as_slice());
    }

    #[test]
    fn test_distinct_wallets_distinct_keys() {
        let a = WalletDerivedKey::derive("wallet-A").unwrap();
        let b = WalletDerivedKey::derive("wallet-B").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_blank_address_rejected() {
        assert!(matches!(WalletDerivedKey::derive(""), Err(SecurityError::InvalidInput(_))));
        assert!(matches!(WalletDerivedKey::derive("   "), Err(SecurityError::InvalidInput(_))));
    }

    #[test]
    fn test_cache_replaces_entry() {
        let mut cache = WalletKeyCache::new();
        assert!(!cache.has_wallet_key());
        assert_eq!(cache.current_address(), None);

        let first = cache.derive("wallet-A").unwrap();
        assert_eq!(cache.current_address(), Some("wallet-A"));
        assert_eq!(cache.derive("wallet-A").unwrap().as_bytes(), first.as_bytes());

        let second = cache.derive("wallet-B").unwrap();
        assert_eq!(cache.current_address(), Some("wallet-B"));
        assert_ne!(first.as_bytes(), second.as_bytes());

        cache.clear();
        assert!(!cache.has_wallet_key());
        assert_eq!(cache.current_address(), None);
    }

    #[test]
    fn test_failed_derivation_keeps_cache() {
        let mut cache = WalletKeyCache::new();
        cache.derive("wallet-A").unwrap();
        assert!(cache.derive("").is_err());
        assert_eq!(cache.current_address(), Some("wallet-A"));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = WalletDerivedKey::derive("wallet-A").unwrap();
        assert_eq!(format!("{:?}", key), "WalletDerivedKey(<redacted>)");
    }
}
