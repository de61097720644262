use crate::core::crypto::keys::WalletDerivedKey;
use crate::infrastructure::platform::{KeyHandle, KeySpec};
use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use super::EncryptedEnvelope;

const WALLET_KEY_LABEL: &str = "wallet";

/// AES-256-GCM envelope encryption over store-held or wallet-derived keys
///
/// IVs always come from the key handle; callers never choose one.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCipher;

impl EnvelopeCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt under a store key. Any fault surfaces as `Encryption`.
    pub fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> SecurityResult<EncryptedEnvelope> {
        let (iv, ciphertext) = handle.encrypt(plaintext).map_err(|e| match e {
            SecurityError::Encryption(_) => e,
            other => SecurityError::encryption(format!("Key store fault: code {}", other.code())),
        })?;
        let envelope = EncryptedEnvelope::sealed_now(iv, ciphertext)
            .map_err(|_| SecurityError::encryption("Cipher produced a malformed envelope"))?;

        log::debug!(
            "Encrypted {} bytes under {} ({} byte envelope)",
            plaintext.len(),
            handle.alias(),
            envelope.serialized_len()
        );
        Ok(envelope)
    }

    /// Decrypt with no presence check. Every failure is the same `Decryption`.
    pub fn decrypt(&self, handle: &KeyHandle, envelope: &EncryptedEnvelope) -> SecurityResult<Vec<u8>> {
        handle
            .init_decrypt(envelope.iv())
            .and_then(|bound| bound.do_final(envelope.ciphertext()))
            .map_err(|_| SecurityError::Decryption)
    }

    pub fn encrypt_with_wallet_key(
        &self,
        key: &WalletDerivedKey,
        plaintext: &[u8],
    ) -> SecurityResult<EncryptedEnvelope> {
        let handle = Self::wallet_handle(key).map_err(|_| SecurityError::encryption("Invalid wallet key"))?;
        self.encrypt(&handle, plaintext)
    }

    pub fn decrypt_with_wallet_key(
        &self,
        key: &WalletDerivedKey,
        envelope: &EncryptedEnvelope,
    ) -> SecurityResult<Vec<u8>> {
        let handle = Self::wallet_handle(key).map_err(|_| SecurityError::Decryption)?;
        self.decrypt(&handle, envelope)
    }

    /// Round-trip a fixed string; reports `false` instead of failing
    pub fn verify_encryption_system(&self, handle: &KeyHandle) -> bool {
        let check = || -> SecurityResult<bool> {
            let envelope = self.encrypt(handle, SELF_TEST_PLAINTEXT)?;
            Ok(!envelope.ciphertext().is_empty() && envelope.iv().len() == IV_SIZE)
        };

        match check() {
            Ok(passed) => {
                log::debug!("Encryption self-test passed: {}", passed);
                passed
            }
            Err(e) => {
                log::warn!("Encryption self-test failed with code {}", e.code());
                false
            }
        }
    }

    fn wallet_handle(key: &WalletDerivedKey) -> SecurityResult<KeyHandle> {
        KeyHandle::from_key_material(WALLET_KEY_LABEL, key.as_bytes(), KeySpec::aes_gcm_256(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::platform::KeyPurpose;
    use proptest::prelude::*;

    fn store_handle() -> KeyHandle {
        KeyHandle::from_key_material("master", &[0x11u8; AES_KEY_SIZE], KeySpec::aes_gcm_256(false)).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_data() {
        let cipher = EnvelopeCipher::new();
        let handle = store_handle();
        let envelope = cipher.encrypt(&handle, b"soulon-test").expect("Failed to encrypt data");

        assert_eq!(envelope.iv().len(), IV_SIZE);
        assert!(envelope.ciphertext().len() >= b"soulon-test".len() + TAG_SIZE);
        assert!(envelope.timestamp() > 0);
        assert_eq!(cipher.decrypt(&handle, &envelope).unwrap(), b"soulon-test");
    }

    #[test]
    fn test_encrypt_empty_data() {
        let cipher = EnvelopeCipher::new();
        let handle = store_handle();
        let envelope = cipher.encrypt(&handle, b"").unwrap();
        assert_eq!(envelope.ciphertext().len(), TAG_SIZE);
        assert!(cipher.decrypt(&handle, &envelope).unwrap().is_empty());
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let cipher = EnvelopeCipher::new();
        let envelope = cipher.encrypt(&store_handle(), b"Hello, World!").unwrap();
        let other = KeyHandle::from_key_material("other", &[0x22u8; AES_KEY_SIZE], KeySpec::aes_gcm_256(false)).unwrap();
        assert_eq!(cipher.decrypt(&other, &envelope).unwrap_err(), SecurityError::Decryption);
    }

    #[test]
    fn test_encrypt_only_key_rejected() {
        let mut spec = KeySpec::aes_gcm_256(false);
        spec.purposes.retain(|p| *p == KeyPurpose::Decrypt);
        let handle = KeyHandle::from_key_material("decrypt-only", &[0x33u8; AES_KEY_SIZE], spec).unwrap();
        assert!(matches!(
            EnvelopeCipher::new().encrypt(&handle, b"data"),
            Err(SecurityError::Encryption(_))
        ));
        assert!(!EnvelopeCipher::new().verify_encryption_system(&handle));
    }

    #[test]
    fn test_verify_encryption_system() {
        assert!(EnvelopeCipher::new().verify_encryption_system(&store_handle()));
    }

    #[test]
    fn test_wallet_key_round_trip_across_derivations() {
        let cipher = EnvelopeCipher::new();
        let first = WalletDerivedKey::derive("wallet-A").unwrap();
        let second = WalletDerivedKey::derive("wallet-A").unwrap();
        let envelope = cipher.encrypt_with_wallet_key(&first, b"recoverable").unwrap();
        assert_eq!(cipher.decrypt_with_wallet_key(&second, &envelope).unwrap(), b"recoverable");

        let other = WalletDerivedKey::derive("wallet-B").unwrap();
        assert_eq!(
            cipher.decrypt_with_wallet_key(&other, &envelope).unwrap_err(),
            SecurityError::Decryption
        );
    }

    proptest! {
        #[test]
        fn prop_round_trip(plaintext in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let cipher = EnvelopeCipher::new();
            let handle = store_handle();
            let envelope = cipher.encrypt(&handle, &plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&handle, &envelope).unwrap(), plaintext);
        }

        #[test]
        fn prop_any_bit_flip_is_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 1..256),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let cipher = EnvelopeCipher::new();
            let handle = store_handle();
            let envelope = cipher.encrypt(&handle, &plaintext).unwrap();

            let mut tampered = envelope.ciphertext().to_vec();
            let index = position.index(tampered.len());
            tampered[index] ^= 1 << bit;
            let tampered = EncryptedEnvelope::new(envelope.iv().to_vec(), tampered, envelope.timestamp()).unwrap();

            prop_assert_eq!(cipher.decrypt(&handle, &tampered).unwrap_err(), SecurityError::Decryption);
        }

        #[test]
        fn prop_iv_tamper_is_detected(plaintext in proptest::collection::vec(any::<u8>(), 0..256), byte in 0usize..IV_SIZE) {
            let cipher = EnvelopeCipher::new();
            let handle = store_handle();
            let envelope = cipher.encrypt(&handle, &plaintext).unwrap();

            let mut iv = envelope.iv().to_vec();
            iv[byte] ^= 0x80;
            let tampered = EncryptedEnvelope::new(iv, envelope.ciphertext().to_vec(), envelope.timestamp()).unwrap();

            prop_assert_eq!(cipher.decrypt(&handle, &tampered).unwrap_err(), SecurityError::Decryption);
        }
    }
}
