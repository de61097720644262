//! Hardware-anchored master secret
//!
//! The master secret is an AES-256-GCM key that lives inside the key store under
//! a fixed alias. It is created once on first use and never regenerated while it
//! exists; callers only ever see a [`KeyHandle`].

use crate::infrastructure::platform::{HardwareKeyStore, KeyHandle, KeySpec};
use crate::shared::constants::MASTER_KEY_ALIAS;
use crate::shared::error::SecurityError;
use std::sync::Arc;

/// Lifecycle of the single master key
pub struct MasterKey {
    store: Arc<dyn HardwareKeyStore>,
    alias: String,
    require_authentication: bool,
}

impl MasterKey {
    /// Master key under the default alias
    pub fn new(store: Arc<dyn HardwareKeyStore>, require_authentication: bool) -> Self {
        Self::with_alias(store, MASTER_KEY_ALIAS, require_authentication)
    }

    pub fn with_alias(store: Arc<dyn HardwareKeyStore>, alias: &str, require_authentication: bool) -> Self {
        Self {
            store,
            alias: alias.to_string(),
            require_authentication,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Spec used when the key is first generated
    pub fn spec(&self) -> KeySpec {
        KeySpec::aes_gcm_256(self.require_authentication)
    }

    pub fn exists(&self) -> Result<bool, SecurityError> {
        self.store.key_exists(&self.alias)
    }

    /// Generate the key if absent. Returns `true` when a new key was created.
    pub fn ensure(&self) -> Result<bool, SecurityError> {
        if self.store.key_exists(&self.alias)? {
            log::debug!("Master key already present under {}", self.alias);
            return Ok(false);
        }

        self.store.generate_symmetric_key(&self.alias, &self.spec())?;
        log::info!("Generated master key under {}", self.alias);
        Ok(true)
    }

    /// Fetch a handle, failing with `KeyStore` if the key was never generated
    pub fn handle(&self) -> Result<KeyHandle, SecurityError> {
        if !self.store.key_exists(&self.alias)? {
            return Err(SecurityError::key_store("Master key not found"));
        }
        self.store.get_key_handle(&self.alias)
    }

    /// Remove the key. Anything sealed under it becomes unrecoverable.
    pub fn delete(&self) -> Result<(), SecurityError> {
        self.store.delete_key(&self.alias)?;
        log::warn!("Deleted master key {}", self.alias);
        Ok(())
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("alias", &self.alias)
            .field("require_authentication", &self.require_authentication)
            .finish_non_exhaustive()
    }
}
