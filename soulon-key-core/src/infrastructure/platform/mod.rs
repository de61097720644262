//! Platform-specific implementations
//!
//! This module defines the contract a hardware key store must satisfy and ships
//! two software implementations for hosts without one.
//!
//! SECURITY: key material never leaves a store implementation in cleartext.
//! Callers only ever receive a [`KeyHandle`], an initialized cipher engine that
//! can encrypt and decrypt but cannot export its key.

pub mod key_handle;
pub mod memory_keystore;
pub mod file_keystore;

pub use key_handle::*;
pub use memory_keystore::*;
pub use file_keystore::*;

use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityLevel;
use serde::{Deserialize, Serialize};
#[cfg(not(target_os = "android"))]
use sys_info;

/// Platform-specific features and capabilities
#[derive(Debug, Clone)]
pub struct PlatformFeatures {
    pub has_hardware_keystore: bool,
    pub has_biometric_auth: bool,
    pub platform_name: String,
    pub architecture: String,
    pub os_version: String,
}

impl PlatformFeatures {
    /// Detect platform features
    pub fn detect() -> Self {
        #[cfg(target_os = "android")]
        let (platform_name, os_version) = ("android".to_string(), "unknown".to_string());
        #[cfg(not(target_os = "android"))]
        let (platform_name, os_version) = (
            sys_info::os_type().unwrap_or_else(|_| std::env::consts::OS.to_string()),
            sys_info::os_release().unwrap_or_else(|_| "unknown".to_string()),
        );

        Self {
            has_hardware_keystore: cfg!(has_hardware_keystore),
            has_biometric_auth: cfg!(has_biometric_auth),
            platform_name: platform_name.to_lowercase(),
            architecture: std::env::consts::ARCH.to_string(),
            os_version,
        }
    }

    /// Check if a presence ceremony can be backed by biometrics
    pub fn supports_biometric_auth(&self) -> bool {
        self.has_biometric_auth
    }

    /// Get recommended security level for platform
    pub fn recommended_security_level(&self) -> SecurityLevel {
        match (self.has_hardware_keystore, self.has_biometric_auth) {
            (true, true) => SecurityLevel::High,
            (true, false) | (false, true) => SecurityLevel::Medium,
            (false, false) => SecurityLevel::Low,
        }
    }
}

/// Operations a key may be used for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Encrypt,
    Decrypt,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockMode {
    Gcm,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Padding {
    None,
}

/// Generation parameters for a symmetric key held by a key store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeySpec {
    pub purposes: Vec<KeyPurpose>,
    pub block_mode: BlockMode,
    pub padding: Padding,
    pub key_size_bits: u32,
    pub require_authentication: bool,
    pub randomized_encryption: bool,
}

impl KeySpec {
    /// AES-256-GCM encrypt/decrypt key, the only shape the key core uses
    pub fn aes_gcm_256(require_authentication: bool) -> Self {
        Self {
            purposes: vec![KeyPurpose::Encrypt, KeyPurpose::Decrypt],
            block_mode: BlockMode::Gcm,
            padding: Padding::None,
            key_size_bits: AES_KEY_SIZE_BITS,
            require_authentication,
            randomized_encryption: true,
        }
    }

    pub fn allows(&self, purpose: KeyPurpose) -> bool {
        self.purposes.contains(&purpose)
    }

    /// Reject any spec a store cannot honour
    pub fn validate(&self) -> Result<(), SecurityError> {
        if self.key_size_bits != AES_KEY_SIZE_BITS {
            return Err(SecurityError::key_store(format!(
                "Unsupported key size: {} bits",
                self.key_size_bits
            )));
        }
        if !self.randomized_encryption {
            return Err(SecurityError::key_store("Randomized encryption is required"));
        }
        if self.purposes.is_empty() {
            return Err(SecurityError::key_store("Key spec must declare at least one purpose"));
        }
        Ok(())
    }
}

/// Opaque secret-key container
///
/// Implementations must never regenerate or overwrite an alias that already
/// exists, and must never hand out raw key bytes.
pub trait HardwareKeyStore: Send + Sync {
    /// Check whether a key exists under `alias`
    fn key_exists(&self, alias: &str) -> Result<bool, SecurityError>;

    /// Generate a new symmetric key under `alias`
    fn generate_symmetric_key(&self, alias: &str, spec: &KeySpec) -> Result<(), SecurityError>;

    /// Fetch an opaque handle to the key under `alias`
    fn get_key_handle(&self, alias: &str) -> Result<KeyHandle, SecurityError>;

    /// Delete the key under `alias`; deleting a missing alias is not an error
    fn delete_key(&self, alias: &str) -> Result<(), SecurityError>;
}
