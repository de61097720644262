use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand_core::OsRng;
use rand_core::RngCore;
use std::fmt;
use uuid::Uuid;

use super::{KeyPurpose, KeySpec};

/// Opaque handle to a store-held AES-256-GCM key
///
/// The handle owns an initialized cipher engine only. There is no accessor for
/// the key bytes, and `Debug` prints the alias alone.
#[derive(Clone)]
pub struct KeyHandle {
    alias: String,
    spec: KeySpec,
    cipher: Aes256Gcm,
}

impl KeyHandle {
    /// Build a handle from key material; only key store implementations call this
    pub(crate) fn from_key_material(alias: &str, key: &[u8], spec: KeySpec) -> SecurityResult<Self> {
        if key.len() != AES_KEY_SIZE {
            return Err(SecurityError::key_store("AES-256-GCM requires 32-byte key"));
        }
        Ok(Self {
            alias: alias.to_string(),
            spec,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn spec(&self) -> &KeySpec {
        &self.spec
    }

    /// Encrypt with a fresh random IV chosen by the engine.
    /// Returns `(iv, ciphertext || tag)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> SecurityResult<(Vec<u8>, Vec<u8>)> {
        if !self.spec.allows(KeyPurpose::Encrypt) {
            return Err(SecurityError::encryption("Key is not usable for encryption"));
        }

        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| SecurityError::encryption("AES-GCM encryption failed"))?;

        Ok((iv.to_vec(), ciphertext))
    }

    /// Initialize a decrypt-mode cipher bound to `iv`
    pub fn init_decrypt(&self, iv: &[u8]) -> SecurityResult<BoundCipher> {
        if !self.spec.allows(KeyPurpose::Decrypt) {
            return Err(SecurityError::Decryption);
        }
        let iv: [u8; IV_SIZE] = iv
            .try_into()
            .map_err(|_| SecurityError::invalid_input(format!("IV must be {} bytes", IV_SIZE)))?;

        Ok(BoundCipher {
            binding_id: Uuid::new_v4(),
            cipher: self.cipher.clone(),
            iv,
        })
    }

    /// One-shot decrypt with no presence binding
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> SecurityResult<Vec<u8>> {
        self.init_decrypt(iv)?.do_final(ciphertext)
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("alias", &self.alias)
            .field("require_authentication", &self.spec.require_authentication)
            .finish_non_exhaustive()
    }
}

/// A decrypt-mode cipher already bound to one key and one IV
///
/// This is the object handed to an authenticator and returned by it on success.
/// It is consumed by [`BoundCipher::do_final`], so a single presence ceremony
/// unlocks exactly one decryption.
pub struct BoundCipher {
    binding_id: Uuid,
    cipher: Aes256Gcm,
    iv: [u8; IV_SIZE],
}

impl BoundCipher {
    /// Identity of this binding, stable across [`BoundCipher::fallback_copy`]
    pub fn binding_id(&self) -> Uuid {
        self.binding_id
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Decrypt and authenticate `ciphertext || tag`
    pub fn do_final(self, ciphertext: &[u8]) -> SecurityResult<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(SecurityError::Decryption);
        }
        self.cipher
            .decrypt(Nonce::from_slice(&self.iv), ciphertext)
            .map_err(|_| SecurityError::Decryption)
    }

    /// Second instance with the same binding, kept locally by the caller that
    /// initialized the cipher
    pub(crate) fn fallback_copy(&self) -> Self {
        Self {
            binding_id: self.binding_id,
            cipher: self.cipher.clone(),
            iv: self.iv,
        }
    }
}

impl fmt::Debug for BoundCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCipher")
            .field("binding_id", &self.binding_id)
            .finish_non_exhaustive()
    }
}
