use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Result type used across the key core
pub type SecurityResult<T> = Result<T, crate::shared::error::SecurityError>;

/// Key store backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreBackend {
    /// Key material held in process memory, wiped on drop
    #[default]
    Memory,
    /// Passphrase-wrapped key material persisted on disk
    File,
}

impl KeystoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeystoreBackend::Memory => "memory",
            KeystoreBackend::File => "file",
        }
    }
}

impl fmt::Display for KeystoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeystoreBackend {
    type Err = crate::shared::error::SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(KeystoreBackend::Memory),
            "file" => Ok(KeystoreBackend::File),
            other => Err(crate::shared::error::SecurityError::config(format!(
                "Unknown keystore backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecurityLevel {
    Low,
    Medium,
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystore_backend_parsing() {
        assert_eq!("memory".parse::<KeystoreBackend>().unwrap(), KeystoreBackend::Memory);
        assert_eq!("FILE".parse::<KeystoreBackend>().unwrap(), KeystoreBackend::File);
        assert!("enclave".parse::<KeystoreBackend>().is_err());
    }

    #[test]
    fn test_keystore_backend_serde() {
        let json = serde_json::to_string(&KeystoreBackend::File).unwrap();
        assert_eq!(json, "\"file\"");
        let parsed: KeystoreBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(parsed, KeystoreBackend::Memory);
    }
}
