//! Key core facade
//!
//! [`SecurityManager`] owns the key store, the authenticator and the wallet-key
//! cache, and exposes every operation of the key core. Key store work runs on
//! the blocking pool; presence ceremonies are awaited on the caller's task.

use crate::core::auth::{AuthGate, Authenticator, PromptInfo};
use crate::core::crypto::encryption::{EncryptedEnvelope, EnvelopeCipher};
use crate::core::crypto::hashing::HashManager;
use crate::core::crypto::keys::{DerivedKey, HdKeyDeriver, MasterKey, WalletDerivedKey, WalletKeyCache};
use crate::infrastructure::platform::{HardwareKeyStore, KeyHandle};
use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::settings::KeyCoreConfig;
use crate::shared::types::SecurityResult;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

pub struct SecurityManager {
    master_key: Arc<MasterKey>,
    gate: AuthGate,
    cipher: EnvelopeCipher,
    hasher: HashManager,
    deriver: HdKeyDeriver,
    wallet_keys: Mutex<WalletKeyCache>,
}

impl SecurityManager {
    /// Build a manager and make sure the master key exists before returning
    pub fn new(
        store: Arc<dyn HardwareKeyStore>,
        authenticator: Arc<dyn Authenticator>,
        config: &KeyCoreConfig,
    ) -> SecurityResult<Self> {
        config.validate()?;
        let prompt = PromptInfo::new(config.prompt_title.clone(), config.prompt_subtitle.clone());
        let manager = Self {
            master_key: Arc::new(MasterKey::new(store, config.require_user_authentication)),
            gate: AuthGate::new(authenticator, prompt),
            cipher: EnvelopeCipher::new(),
            hasher: HashManager::new(),
            deriver: HdKeyDeriver::new()?,
            wallet_keys: Mutex::new(WalletKeyCache::new()),
        };
        manager.initialize()?;
        Ok(manager)
    }

    /// Generate the master key if absent. Never replaces an existing key.
    pub fn initialize(&self) -> SecurityResult<()> {
        let created = self.master_key.ensure()?;
        log::info!(
            "Key core ready (master key {})",
            if created { "generated" } else { "present" }
        );
        Ok(())
    }

    pub fn master_key(&self) -> &MasterKey {
        &self.master_key
    }

    pub fn prompt(&self) -> &PromptInfo {
        self.gate.prompt()
    }

    // Hierarchical derivation

    pub fn derive_key_from_seed(&self, seed: &[u8]) -> SecurityResult<DerivedKey> {
        self.deriver.derive_key_from_seed(seed)
    }

    pub fn derive_key_from_mnemonic(&self, phrase: &str, passphrase: &str) -> SecurityResult<DerivedKey> {
        self.deriver.derive_key_from_mnemonic(phrase, passphrase)
    }

    /// Compressed public key of a derived node
    pub fn get_public_key_bytes(&self, key: &DerivedKey) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
        key.get_public_key_bytes()
    }

    // Envelope cipher

    /// Encrypt under the master key. No presence check.
    pub async fn encrypt_data(&self, plaintext: &[u8]) -> SecurityResult<EncryptedEnvelope> {
        let master_key = self.master_key.clone();
        let cipher = self.cipher;
        let plaintext = Zeroizing::new(plaintext.to_vec());

        tokio::task::spawn_blocking(move || {
            let handle = master_key
                .handle()
                .map_err(|e| SecurityError::encryption(format!("Master key unavailable: code {}", e.code())))?;
            cipher.encrypt(&handle, &plaintext)
        })
        .await
        .map_err(|e| SecurityError::encryption(format!("Encryption task failed: {}", e)))?
    }

    /// Decrypt after a presence ceremony bound to this envelope's cipher
    pub async fn decrypt_data(
        &self,
        envelope: &EncryptedEnvelope,
        cancel: &CancellationToken,
    ) -> SecurityResult<Vec<u8>> {
        let handle = self.master_handle().await.map_err(|_| SecurityError::Decryption)?;
        self.gate.decrypt_with_authentication(&handle, envelope, cancel).await
    }

    /// Decrypt without a presence check
    ///
    /// Only call this after a successful [`SecurityManager::authenticate_once`]
    /// in the same workflow; nothing here enforces it.
    pub async fn decrypt_data_direct(&self, envelope: &EncryptedEnvelope) -> SecurityResult<Vec<u8>> {
        let master_key = self.master_key.clone();
        let cipher = self.cipher;
        let envelope = envelope.clone();

        tokio::task::spawn_blocking(move || {
            let handle = master_key.handle().map_err(|_| SecurityError::Decryption)?;
            cipher.decrypt(&handle, &envelope)
        })
        .await
        .map_err(|_| SecurityError::Decryption)?
    }

    /// Presence ceremony with no cipher attached; errors resolve to `false`
    pub async fn authenticate_once(&self, cancel: &CancellationToken) -> SecurityResult<bool> {
        self.gate.authenticate_once(cancel).await
    }

    pub fn generate_hash(&self, data: &[u8]) -> [u8; HASH_SIZE] {
        self.hasher.generate_hash(data)
    }

    /// Self-test of the master key path. Never fails, only reports.
    pub async fn verify_encryption_system(&self) -> bool {
        let master_key = self.master_key.clone();
        let cipher = self.cipher;

        let outcome = tokio::task::spawn_blocking(move || match master_key.handle() {
            Ok(handle) => cipher.verify_encryption_system(&handle),
            Err(e) => {
                log::warn!("Self-test could not fetch master key: code {}", e.code());
                false
            }
        })
        .await;

        outcome.unwrap_or(false)
    }

    /// Delete the master key. Envelopes sealed under it become unrecoverable.
    pub async fn delete_master_key(&self) -> SecurityResult<()> {
        let master_key = self.master_key.clone();
        tokio::task::spawn_blocking(move || master_key.delete()).await?
    }

    // Wallet-derived keys

    pub fn derive_key_from_wallet(&self, wallet_public_id: &str) -> SecurityResult<WalletDerivedKey> {
        self.wallet_keys().derive(wallet_public_id)
    }

    pub fn encrypt_with_wallet_key(
        &self,
        wallet_public_id: &str,
        plaintext: &[u8],
    ) -> SecurityResult<EncryptedEnvelope> {
        let key = self.derive_key_from_wallet(wallet_public_id)?;
        self.cipher.encrypt_with_wallet_key(&key, plaintext)
    }

    pub fn decrypt_with_wallet_key(
        &self,
        wallet_public_id: &str,
        envelope: &EncryptedEnvelope,
    ) -> SecurityResult<Vec<u8>> {
        let key = self.derive_key_from_wallet(wallet_public_id)?;
        self.cipher.decrypt_with_wallet_key(&key, envelope)
    }

    pub fn has_wallet_key(&self) -> bool {
        self.wallet_keys().has_wallet_key()
    }

    pub fn get_current_wallet_address(&self) -> Option<String> {
        self.wallet_keys().current_address().map(str::to_string)
    }

    pub fn clear_wallet_key(&self) {
        self.wallet_keys().clear();
    }

    async fn master_handle(&self) -> SecurityResult<KeyHandle> {
        let master_key = self.master_key.clone();
        tokio::task::spawn_blocking(move || master_key.handle()).await?
    }

    // The cache only holds derived values, so a poisoned lock is still usable
    fn wallet_keys(&self) -> MutexGuard<'_, WalletKeyCache> {
        self.wallet_keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("master_key", &self.master_key)
            .field("derivation_path", &self.deriver.path().to_string())
            .field("wallet_keys", &*self.wallet_keys())
            .finish()
    }
}
