//! Hierarchical deterministic key derivation
//!
//! BIP-32 over secp256k1: HMAC-SHA512 master key generation from a raw seed,
//! followed by hardened child derivation along a fixed four-level path
//! `m/44'/501'/2026'/101'`. Every level is hardened so no intermediate public
//! key can be used to recover sibling keys.

use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use bip32::ChildNumber;
use hmac::{Hmac, Mac};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

use super::SeedBytes;

type HmacSha512 = Hmac<Sha512>;

/// Fixed, versioned sequence of hardened child indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    children: Vec<ChildNumber>,
}

impl DerivationPath {
    /// Build a fully hardened path from raw (unhardened) indices
    pub fn hardened(indices: &[u32]) -> SecurityResult<Self> {
        let children = indices
            .iter()
            .map(|&index| {
                ChildNumber::new(index, true)
                    .map_err(|_| SecurityError::derivation(format!("Invalid child index: {}", index)))
            })
            .collect::<SecurityResult<Vec<_>>>()?;
        Ok(Self { children })
    }

    /// The application path, `m/44'/501'/2026'/101'`
    pub fn soulon() -> SecurityResult<Self> {
        Self::hardened(&DERIVATION_PATH)
    }

    pub fn children(&self) -> &[ChildNumber] {
        &self.children
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for child in &self.children {
            write!(f, "/{}", child.index())?;
            if child.is_hardened() {
                write!(f, "'")?;
            }
        }
        Ok(())
    }
}

/// Private key plus chain code at some depth of the tree
struct ExtendedNode {
    secret_key: SecretKey,
    chain_code: Zeroizing<[u8; CHAIN_CODE_SIZE]>,
    depth: u8,
}

impl ExtendedNode {
    fn master(seed: &[u8]) -> SecurityResult<Self> {
        let digest = hmac_sha512(&BIP32_SEED_KEY[..], &[seed])?;
        Self::from_digest(&digest, 0, |il| {
            SecretKey::from_byte_array(il)
                .map_err(|_| SecurityError::derivation("Seed produced an invalid master key"))
        })
    }

    fn derive_hardened(&self, child: ChildNumber) -> SecurityResult<Self> {
        if !child.is_hardened() {
            return Err(SecurityError::derivation("Only hardened derivation is supported"));
        }
        let raw_index = child.index() | HARDENED_OFFSET;
        let secret = Zeroizing::new(self.secret_key.secret_bytes());
        let digest = hmac_sha512(
            &*self.chain_code,
            &[&[0u8][..], &secret[..], &raw_index.to_be_bytes()[..]],
        )?;

        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| SecurityError::derivation("Maximum derivation depth exceeded"))?;

        Self::from_digest(&digest, depth, |il| {
            // IL >= n or a zero child key: the index is unusable
            let tweak = Scalar::from_be_bytes(il)
                .map_err(|_| SecurityError::derivation(format!("Child index {} is invalid", child.index())))?;
            self.secret_key
                .add_tweak(&tweak)
                .map_err(|_| SecurityError::derivation(format!("Child index {} is invalid", child.index())))
        })
    }

    fn from_digest<F>(digest: &[u8; 64], depth: u8, make_key: F) -> SecurityResult<Self>
    where
        F: FnOnce([u8; 32]) -> SecurityResult<SecretKey>,
    {
        let mut il = Zeroizing::new([0u8; 32]);
        il.copy_from_slice(&digest[..32]);
        let mut chain_code = Zeroizing::new([0u8; CHAIN_CODE_SIZE]);
        chain_code.copy_from_slice(&digest[32..]);

        Ok(Self {
            secret_key: make_key(*il)?,
            chain_code,
            depth,
        })
    }
}

impl Drop for ExtendedNode {
    fn drop(&mut self) {
        self.secret_key.non_secure_erase();
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> SecurityResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|_| SecurityError::derivation("Invalid HMAC key length"))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// The node at the end of the derivation path
///
/// Owned by the caller and never cached; the private key is erased on drop.
pub struct DerivedKey {
    node: ExtendedNode,
    public_key: PublicKey,
}

impl DerivedKey {
    /// Compressed SEC1 public key (33 bytes)
    pub fn get_public_key_bytes(&self) -> [u8; COMPRESSED_PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Uncompressed SEC1 public key (65 bytes)
    pub fn uncompressed_public_key_bytes(&self) -> [u8; 65] {
        self.public_key.serialize_uncompressed()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Copy of the private scalar, wiped when the returned buffer drops
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_SIZE]> {
        Zeroizing::new(self.node.secret_key.secret_bytes())
    }

    pub fn chain_code(&self) -> &[u8; CHAIN_CODE_SIZE] {
        &self.node.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.node.depth
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("depth", &self.node.depth)
            .field("public_key", &hex::encode(self.get_public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Derives application keys from seeds along a fixed path
pub struct HdKeyDeriver {
    secp256k1: Secp256k1<All>,
    path: DerivationPath,
}

impl HdKeyDeriver {
    /// Deriver for the application path `m/44'/501'/2026'/101'`
    pub fn new() -> SecurityResult<Self> {
        Ok(Self {
            secp256k1: Secp256k1::new(),
            path: DerivationPath::soulon()?,
        })
    }

    /// Deriver for a custom hardened path
    pub fn with_path(path: DerivationPath) -> Self {
        Self {
            secp256k1: Secp256k1::new(),
            path,
        }
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Walk `seed` down the derivation path
    ///
    /// Fails with `InvalidInput` before any computation when the seed is shorter
    /// than 16 bytes, and with `Derivation` if any level yields an invalid key.
    pub fn derive_key_from_seed(&self, seed: &[u8]) -> SecurityResult<DerivedKey> {
        if seed.len() < MIN_SEED_SIZE {
            return Err(SecurityError::invalid_input(format!(
                "Seed must be at least {} bytes, got {}",
                MIN_SEED_SIZE,
                seed.len()
            )));
        }

        let mut node = ExtendedNode::master(seed)?;
        for child in self.path.children() {
            node = node.derive_hardened(*child)?;
        }

        let public_key = PublicKey::from_secret_key(&self.secp256k1, &node.secret_key);
        log::debug!("Derived key at {} (depth {})", self.path, node.depth);
        Ok(DerivedKey { node, public_key })
    }

    /// Expand a BIP-39 mnemonic and derive from the resulting seed
    pub fn derive_key_from_mnemonic(&self, phrase: &str, passphrase: &str) -> SecurityResult<DerivedKey> {
        let seed = SeedBytes::from_mnemonic(phrase, passphrase)?;
        self.derive_key_from_seed(seed.as_bytes())
    }
}
