//! User-presence authentication
//!
//! The [`Authenticator`] trait abstracts the presence ceremony. [`AuthGate`]
//! drives it for bound decryptions and one-shot checks, and
//! [`DeviceCredentialAuthenticator`] is the passphrase-based implementation
//! for hosts without a biometric sensor.

pub mod authenticator;
pub mod gated_decryption;
pub mod device_credential;

pub use authenticator::*;
pub use gated_decryption::*;
pub use device_credential::*;
