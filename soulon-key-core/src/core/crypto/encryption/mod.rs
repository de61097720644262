//! Envelope encryption
//!
//! AES-256-GCM with a fresh 12-byte IV per call and a 128-bit tag appended to
//! the ciphertext, plus the fixed big-endian envelope wire format.

pub mod encrypted_envelope;
pub mod envelope_cipher;

pub use encrypted_envelope::*;
pub use envelope_cipher::*;
