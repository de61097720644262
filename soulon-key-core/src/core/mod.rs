//! Core key management
//!
//! Cryptography, presence authentication and the [`SecurityManager`] facade
//! that ties them to a key store.

pub mod crypto;
pub mod auth;
pub mod manager;

pub use manager::SecurityManager;
