//! Key material for the key core
//!
//! Seed handling, hierarchical derivation, the store-held master key and
//! wallet-derived keys.

pub mod secure_seed;
pub mod hd_derivation;
pub mod master_key;
pub mod wallet_key;

pub use secure_seed::*;
pub use hd_derivation::*;
pub use master_key::*;
pub use wallet_key::*;
