//! Cryptographic functionality for the key core
//!
//! SECURITY: secret material is held in zeroizing buffers, never logged and
//! never rendered by `Debug`.

pub mod keys;
pub mod encryption;
pub mod hashing;
pub mod password;

// Re-export all public items from submodules
pub use keys::*;
pub use encryption::*;
pub use hashing::*;
pub use password::*;
