use crate::shared::constants::MIN_SEED_SIZE;
use crate::shared::error::SecurityError;
use std::fmt;
use zeroize::Zeroizing;

/// Raw seed entropy, wiped when dropped
///
/// Exists only for the duration of a derivation; the key core never persists it.
pub struct SeedBytes {
    bytes: Zeroizing<Vec<u8>>,
}

impl SeedBytes {
    /// Wrap seed bytes, rejecting anything shorter than 16 bytes
    pub fn new(bytes: Vec<u8>) -> Result<Self, SecurityError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() < MIN_SEED_SIZE {
            return Err(SecurityError::invalid_input(format!(
                "Seed must be at least {} bytes, got {}",
                MIN_SEED_SIZE,
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Expand a BIP-39 mnemonic (and optional passphrase) into a 64-byte seed
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, SecurityError> {
        let mnemonic = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, phrase)
            .map_err(|e| SecurityError::invalid_input(format!("Invalid BIP39 seed phrase: {}", e)))?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(passphrase));
        Self::new(seed.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SeedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedBytes({} bytes)", self.bytes.len())
    }
}
