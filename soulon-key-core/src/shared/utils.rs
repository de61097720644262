//! Small helpers shared across the key core

use crate::shared::error::SecurityError;

/// Current wall-clock time as epoch milliseconds
pub fn current_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Validate a public wallet identifier
///
/// Any non-blank string is accepted; the identifier is used verbatim as key
/// derivation input so no normalisation is applied.
pub fn validate_wallet_address(address: &str) -> Result<(), SecurityError> {
    if address.trim().is_empty() {
        return Err(SecurityError::invalid_input("Wallet address cannot be empty"));
    }
    Ok(())
}
