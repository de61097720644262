//! Soulon Key Core
//!
//! Hardware-anchored key management for Soulon.
//!
//! ## Architecture
//!
//! - **Core**: HD key derivation, envelope encryption, wallet-derived keys,
//!   authentication-gated decryption and the [`SecurityManager`] facade
//! - **Infrastructure**: key store implementations and platform detection
//! - **Shared**: errors, constants, configuration and utilities
//!
//! ## Security Features
//!
//! - Master key never leaves the key store; callers hold an opaque handle
//! - Decryption under the master key is bound to one presence ceremony
//! - Secrets are zeroized on drop and redacted from `Debug` output
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run(authenticator: std::sync::Arc<dyn soulon_key_core::Authenticator>) -> soulon_key_core::SecurityResult<()> {
//! use tokio_util::sync::CancellationToken;
//!
//! soulon_key_core::init();
//! let manager = soulon_key_core::init_key_core(authenticator)?;
//!
//! let envelope = manager.encrypt_data(b"secret").await?;
//! let plaintext = manager.decrypt_data(&envelope, &CancellationToken::new()).await?;
//! assert_eq!(plaintext, b"secret");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub mod core;
pub mod shared;
pub mod infrastructure;

pub use crate::core::auth::{
    AllowedAuthenticators, AuthEvent, AuthGate, Authenticator, ChallengeRequest, CredentialPrompt,
    DeviceCredentialAuthenticator, PromptInfo, TerminalPrompt,
};
pub use crate::core::crypto::encryption::EncryptedEnvelope;
pub use crate::core::crypto::keys::{DerivedKey, WalletDerivedKey};
pub use crate::core::SecurityManager;
pub use crate::infrastructure::platform::{HardwareKeyStore, InMemoryKeyStore, SecureFileKeyStore};
pub use shared::error::SecurityError;
pub use shared::settings::KeyCoreConfig;
pub use shared::types::{KeystoreBackend, SecurityResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
pub use ffi::*;

/// Install the logger. `RUST_LOG` wins over the configured level; safe to call twice.
pub fn init() {
    let level = KeyCoreConfig::load()
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
}

/// Build the key store selected by `config`
pub fn open_key_store(config: &KeyCoreConfig) -> SecurityResult<Arc<dyn HardwareKeyStore>> {
    match config.keystore_backend {
        KeystoreBackend::Memory => {
            log::warn!("Using in-memory key store; keys are lost on exit");
            Ok(Arc::new(InMemoryKeyStore::new()))
        }
        KeystoreBackend::File => {
            let dir = config.resolved_storage_dir();
            log::info!("Using file key store at {}", dir.display());
            Ok(Arc::new(SecureFileKeyStore::open(dir)?))
        }
    }
}

/// Load configuration, open the configured key store and return a ready manager
///
/// The authenticator comes from the host, which owns the prompt UI.
pub fn init_key_core(authenticator: Arc<dyn Authenticator>) -> SecurityResult<SecurityManager> {
    let config = KeyCoreConfig::load()?;
    let store = open_key_store(&config)?;
    SecurityManager::new(store, authenticator, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn test_open_memory_store() {
        let config = KeyCoreConfig::default();
        let store = open_key_store(&config).unwrap();
        assert!(!store.key_exists(shared::constants::MASTER_KEY_ALIAS).unwrap());
    }

    #[test]
    fn test_version_info() {
        assert_eq!(NAME, "soulon-key-core");
        assert!(!VERSION.is_empty());
    }
}
