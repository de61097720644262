//! Integrity hashing

pub mod hash_manager;

pub use hash_manager::*;
