//! Error handling for the key core
//!
//! This module defines the error taxonomy used throughout the key core.
//! Messages never carry plaintext or key material, only sizes, aliases and codes.

use thiserror::Error;

/// Key core error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Derivation error: {0}")]
    Derivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    // Tag mismatch and wrong key are reported identically.
    #[error("Decryption failed")]
    Decryption,

    #[error("Authentication error ({code}): {message}")]
    Authentication { code: i32, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SecurityError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a key store error
    pub fn key_store(message: impl Into<String>) -> Self {
        Self::KeyStore(message.into())
    }

    /// Create a derivation error
    pub fn derivation(message: impl Into<String>) -> Self {
        Self::Derivation(message.into())
    }

    /// Create an encryption error
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption(message.into())
    }

    /// Create an authentication error
    pub fn authentication(code: i32, message: impl Into<String>) -> Self {
        Self::Authentication {
            code,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable numeric code, used across the FFI boundary
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) => 1,
            Self::KeyStore(_) => 2,
            Self::Derivation(_) => 3,
            Self::Encryption(_) => 4,
            Self::Decryption => 5,
            Self::Authentication { .. } => 6,
            Self::Cancelled => 7,
            Self::Config(_) => 8,
            Self::Internal(_) => 9,
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for SecurityError {
    fn from(err: std::io::Error) -> Self {
        Self::key_store(format!("IO error: {}", err.kind()))
    }
}

impl From<hex::FromHexError> for SecurityError {
    fn from(err: hex::FromHexError) -> Self {
        Self::invalid_input(format!("Hex decoding error: {}", err))
    }
}

impl From<base64::DecodeError> for SecurityError {
    fn from(err: base64::DecodeError) -> Self {
        Self::invalid_input(format!("Base64 decoding error: {}", err))
    }
}

impl From<serde_json::Error> for SecurityError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<::config::ConfigError> for SecurityError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SecurityError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("Task join error: {}", err))
    }
}

// Cryptographic error conversions
impl From<secp256k1::Error> for SecurityError {
    fn from(err: secp256k1::Error) -> Self {
        Self::derivation(format!("Secp256k1 error: {}", err))
    }
}

impl From<argon2::password_hash::Error> for SecurityError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::key_store(format!("Password hash error: {}", err))
    }
}

impl From<argon2::Error> for SecurityError {
    fn from(err: argon2::Error) -> Self {
        Self::key_store(format!("Argon2 error: {}", err))
    }
}
