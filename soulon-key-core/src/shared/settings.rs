//! Runtime configuration for the key core
//!
//! Only ambient settings are configurable. Aliases, derivation path and cipher
//! parameters are fixed in `shared::constants`.

use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use crate::shared::types::KeystoreBackend;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix, e.g. `SOULON_KEYSTORE_BACKEND=file`
pub const ENV_PREFIX: &str = "SOULON";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyCoreConfig {
    pub log_level: String,
    pub keystore_backend: KeystoreBackend,
    pub storage_dir: Option<PathBuf>,
    pub prompt_title: String,
    pub prompt_subtitle: String,
    pub max_credential_attempts: u32,
    pub require_user_authentication: bool,
}

impl Default for KeyCoreConfig {
    fn default() -> Self {
        Self {
            log_level: if cfg!(debug_assertions) { "debug" } else { "info" }.to_string(),
            keystore_backend: KeystoreBackend::Memory,
            storage_dir: None,
            prompt_title: DEFAULT_PROMPT_TITLE.to_string(),
            prompt_subtitle: DEFAULT_PROMPT_SUBTITLE.to_string(),
            max_credential_attempts: MAX_CREDENTIAL_ATTEMPTS,
            require_user_authentication: true,
        }
    }
}

impl KeyCoreConfig {
    /// Load configuration from `.env` and `SOULON_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn load() -> Result<Self, SecurityError> {
        dotenv::dotenv().ok();
        Self::from_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Build configuration from an arbitrary `config` source layered over defaults
    pub fn from_source<S>(source: S) -> Result<Self, SecurityError>
    where
        S: ::config::Source + Send + Sync + 'static,
    {
        let defaults = Self::default();
        let settings = ::config::Config::builder()
            .set_default("log_level", defaults.log_level.clone())?
            .set_default("keystore_backend", defaults.keystore_backend.as_str())?
            .set_default("prompt_title", defaults.prompt_title.clone())?
            .set_default("prompt_subtitle", defaults.prompt_subtitle.clone())?
            .set_default("max_credential_attempts", defaults.max_credential_attempts as i64)?
            .set_default("require_user_authentication", defaults.require_user_authentication)?
            .add_source(source)
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), SecurityError> {
        if self.max_credential_attempts == 0 {
            return Err(SecurityError::config("max_credential_attempts must be at least 1"));
        }
        if self.prompt_title.trim().is_empty() {
            return Err(SecurityError::config("prompt_title cannot be empty"));
        }
        Ok(())
    }

    /// Directory used by the file-backed key store
    pub fn resolved_storage_dir(&self) -> PathBuf {
        match &self.storage_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("./secure_storage"))
                .join(KEYSTORE_DIR_NAME),
        }
    }
}
