use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use rand_core::OsRng;
use rand_core::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use zeroize::Zeroizing;

use super::{HardwareKeyStore, KeyHandle, KeySpec};

struct StoredKey {
    material: Zeroizing<[u8; AES_KEY_SIZE]>,
    spec: KeySpec,
}

/// Software key store holding key material in process memory
///
/// Key bytes live in `Zeroizing` buffers and are wiped when an alias is deleted
/// or the store is dropped. Nothing survives a process restart.
pub struct InMemoryKeyStore {
    keys: Mutex<HashMap<String, StoredKey>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredKey>>, SecurityError> {
        self.keys
            .lock()
            .map_err(|_| SecurityError::key_store("In-memory key store lock poisoned"))
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareKeyStore for InMemoryKeyStore {
    fn key_exists(&self, alias: &str) -> Result<bool, SecurityError> {
        Ok(self.lock()?.contains_key(alias))
    }

    fn generate_symmetric_key(&self, alias: &str, spec: &KeySpec) -> Result<(), SecurityError> {
        spec.validate()?;
        let mut keys = self.lock()?;
        if keys.contains_key(alias) {
            return Err(SecurityError::key_store(format!("Key alias already exists: {}", alias)));
        }

        let mut material = Zeroizing::new([0u8; AES_KEY_SIZE]);
        OsRng.fill_bytes(&mut *material);
        keys.insert(
            alias.to_string(),
            StoredKey {
                material,
                spec: spec.clone(),
            },
        );
        log::debug!("Generated in-memory key under alias {}", alias);
        Ok(())
    }

    fn get_key_handle(&self, alias: &str) -> Result<KeyHandle, SecurityError> {
        let keys = self.lock()?;
        let stored = keys
            .get(alias)
            .ok_or_else(|| SecurityError::key_store(format!("Key alias not found: {}", alias)))?;
        KeyHandle::from_key_material(alias, &*stored.material, stored.spec.clone())
    }

    fn delete_key(&self, alias: &str) -> Result<(), SecurityError> {
        // Dropping the entry zeroizes its material
        self.lock()?.remove(alias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_fetch() {
        let store = InMemoryKeyStore::new();
        assert!(!store.key_exists("alias").unwrap());

        store
            .generate_symmetric_key("alias", &KeySpec::aes_gcm_256(true))
            .expect("Failed to generate key");
        assert!(store.key_exists("alias").unwrap());

        let handle = store.get_key_handle("alias").expect("Failed to fetch handle");
        assert_eq!(handle.alias(), "alias");
        assert!(handle.spec().require_authentication);
    }

    #[test]
    fn test_existing_alias_never_regenerated() {
        let store = InMemoryKeyStore::new();
        store.generate_symmetric_key("alias", &KeySpec::aes_gcm_256(false)).unwrap();
        let (iv, ciphertext) = store.get_key_handle("alias").unwrap().encrypt(b"keep").unwrap();

        let second = store.generate_symmetric_key("alias", &KeySpec::aes_gcm_256(false));
        assert!(matches!(second, Err(SecurityError::KeyStore(_))));

        // Original material is still in place
        let plaintext = store.get_key_handle("alias").unwrap().decrypt(&iv, &ciphertext).unwrap();
        assert_eq!(plaintext, b"keep");
    }

    #[test]
    fn test_missing_alias() {
        let store = InMemoryKeyStore::new();
        assert!(matches!(store.get_key_handle("missing"), Err(SecurityError::KeyStore(_))));
    }

    #[test]
    fn test_delete() {
        let store = InMemoryKeyStore::new();
        store.generate_symmetric_key("alias", &KeySpec::aes_gcm_256(false)).unwrap();
        store.delete_key("alias").expect("Failed to delete key");
        assert!(!store.key_exists("alias").unwrap());
        // Deleting twice is fine
        store.delete_key("alias").expect("Second delete should succeed");
    }

    #[test]
    fn test_distinct_aliases_get_distinct_keys() {
        let store = InMemoryKeyStore::new();
        store.generate_symmetric_key("a", &KeySpec::aes_gcm_256(false)).unwrap();
        store.generate_symmetric_key("b", &KeySpec::aes_gcm_256(false)).unwrap();
        let (iv, ciphertext) = store.get_key_handle("a").unwrap().encrypt(b"secret").unwrap();
        let result = store.get_key_handle("b").unwrap().decrypt(&iv, &ciphertext);
        assert_eq!(result.unwrap_err(), SecurityError::Decryption);
    }
}
