use crate::infrastructure::platform::KdfParams;
use crate::shared::error::SecurityError;
use crate::shared::types::SecurityResult;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand_core::OsRng;

/// Hashes and checks device credentials as Argon2id PHC strings
///
/// Verification reads its parameters from the PHC string, so hashes created
/// with different costs stay verifiable.
pub struct CredentialVerifier {
    params: KdfParams,
}

impl CredentialVerifier {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn new_default() -> Self {
        Self::new(KdfParams::default())
    }

    fn argon2(&self) -> SecurityResult<Argon2<'static>> {
        let params = Params::new(
            self.params.memory_cost,
            self.params.time_cost,
            self.params.parallelism,
            None,
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a credential into a PHC string
    pub fn hash_credential(&self, credential: &str) -> SecurityResult<String> {
        if credential.is_empty() {
            return Err(SecurityError::invalid_input("Credential cannot be empty"));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2()?.hash_password(credential.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on mismatch, `Err` only for a malformed stored hash
    pub fn verify_credential(&self, credential: &str, phc_hash: &str) -> SecurityResult<bool> {
        let parsed = PasswordHash::new(phc_hash)?;
        Ok(Argon2::default()
            .verify_password(credential.as_bytes(), &parsed)
            .is_ok())
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new_default()
    }
}
