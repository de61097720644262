use crate::shared::constants::HASH_SIZE;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Stateless SHA-256 digests for integrity checks
#[derive(Debug, Default, Clone, Copy)]
pub struct HashManager;

impl HashManager {
    pub fn new() -> Self {
        Self
    }

    /// SHA-256 of `data`
    pub fn generate_hash(&self, data: &[u8]) -> [u8; HASH_SIZE] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    /// Hash to lowercase hex string
    pub fn generate_hash_hex(&self, data: &[u8]) -> String {
        hex::encode(self.generate_hash(data))
    }

    /// Compare `data` against an expected digest in constant time
    pub fn verify_hash(&self, data: &[u8], expected: &[u8]) -> bool {
        let actual = self.generate_hash(data);
        // Unequal lengths compare as not equal
        actual[..].ct_eq(expected).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vectors() {
        let manager = HashManager::new();
        assert_eq!(
            manager.generate_hash_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            manager.generate_hash_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_consistency() {
        let manager = HashManager::new();
        assert_eq!(manager.generate_hash(b"Hello, World!"), manager.generate_hash(b"Hello, World!"));
        assert_ne!(manager.generate_hash(b"Hello, World!"), manager.generate_hash(b"Hello, World?"));
    }

    #[test]
    fn test_verify_hash() {
        let manager = HashManager::new();
        let digest = manager.generate_hash(b"payload");
        assert!(manager.verify_hash(b"payload", &digest));
        assert!(!manager.verify_hash(b"tampered", &digest));
        assert!(!manager.verify_hash(b"payload", &digest[..16]));
        assert!(!manager.verify_hash(b"payload", &[]));

        let mut flipped = digest;
        flipped[HASH_SIZE - 1] ^= 0x01;
        assert!(!manager.verify_hash(b"payload", &flipped));
    }
}
