//! Shared types, utilities, and constants
//!
//! This module contains common types, utilities, configuration and constants used
//! throughout the key core.

pub mod types;
pub mod utils;
pub mod constants;
pub mod settings;
pub mod error;

// Re-export shared components
pub use types::*;
pub use utils::*;
pub use constants::*;
pub use settings::*;
pub use error::*;
