//! Infrastructure layer - platform-specific implementations
//!
//! This module contains the key store collaborators and platform detection
//! the key core runs on top of.

pub mod platform;

// Re-export infrastructure components
pub use platform::*;
