//! Passphrase-wrapped key store persisted on disk
//!
//! Stand-in for a platform keystore on desktop hosts. Each alias is stored as a
//! JSON record holding the key spec and the key material wrapped with
//! AES-256-GCM under an Argon2id key derived from the store passphrase and a
//! per-alias random salt. The alias is bound in as associated data, so a record
//! copied to another alias fails to unwrap. Unwrapped handles are kept in
//! memory until the alias is deleted.

use crate::shared::constants::*;
use crate::shared::error::SecurityError;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand_core::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use zeroize::Zeroizing;

use super::{HardwareKeyStore, KeyHandle, KeySpec};

/// Environment variable consulted before prompting for the store passphrase
pub const KEYSTORE_PASSPHRASE_ENV: &str = "SOULON_KEYSTORE_PASSPHRASE";

const RECORD_VERSION: u8 = 1;

/// Argon2id cost parameters, shared by key wrapping and credential hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: ARGON2_MEMORY_COST,
            time_cost: ARGON2_TIME_COST,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedKey {
    version: u8,
    spec: KeySpec,
    nonce: String,
    wrapped: String,
}

pub struct SecureFileKeyStore {
    dir: PathBuf,
    passphrase: Zeroizing<String>,
    kdf: KdfParams,
    // Serializes generate/delete so exists-then-write cannot interleave
    write_lock: Mutex<()>,
    // Unwrapped handles, so the Argon2id cost is paid once per alias
    handles: Mutex<HashMap<String, KeyHandle>>,
}

impl SecureFileKeyStore {
    pub fn new(dir: impl Into<PathBuf>, passphrase: impl Into<String>) -> Result<Self, SecurityError> {
        Self::with_kdf_params(dir, passphrase, KdfParams::default())
    }

    pub fn with_kdf_params(
        dir: impl Into<PathBuf>,
        passphrase: impl Into<String>,
        kdf: KdfParams,
    ) -> Result<Self, SecurityError> {
        let passphrase = Zeroizing::new(passphrase.into());
        if passphrase.is_empty() {
            return Err(SecurityError::key_store("Key store passphrase cannot be empty"));
        }
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            passphrase,
            kdf,
            write_lock: Mutex::new(()),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Open the store using `SOULON_KEYSTORE_PASSPHRASE`, prompting on the
    /// terminal when it is unset
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SecurityError> {
        let passphrase = match std::env::var(KEYSTORE_PASSPHRASE_ENV) {
            Ok(pw) => pw,
            Err(_) => rpassword::prompt_password("Enter passphrase for Soulon key store: ")
                .map_err(|e| SecurityError::key_store(format!("Passphrase prompt failed: {}", e.kind())))?,
        };
        Self::new(dir, passphrase)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Hash the alias so file names do not enumerate key aliases
    fn file_stem(alias: &str) -> String {
        let hash = Sha256::digest(alias.as_bytes());
        hex::encode(&hash[..16])
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", Self::file_stem(alias), KEYSTORE_FILE_EXTENSION))
    }

    fn salt_path(&self, alias: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", Self::file_stem(alias), KEYSTORE_SALT_EXTENSION))
    }

    fn derive_wrapping_key(&self, salt: &[u8]) -> Result<Zeroizing<[u8; AES_KEY_SIZE]>, SecurityError> {
        let argon2 = Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            argon2::Params::new(
                self.kdf.memory_cost,
                self.kdf.time_cost,
                self.kdf.parallelism,
                Some(AES_KEY_SIZE),
            )?,
        );
        let mut key = Zeroizing::new([0u8; AES_KEY_SIZE]);
        argon2.hash_password_into(self.passphrase.as_bytes(), salt, &mut *key)?;
        Ok(key)
    }

    fn read_salt(&self, alias: &str) -> Result<Vec<u8>, SecurityError> {
        let mut salt = vec![];
        File::open(self.salt_path(alias))?.read_to_end(&mut salt)?;
        if salt.len() != KEYSTORE_SALT_SIZE {
            return Err(SecurityError::key_store("Corrupt key store salt"));
        }
        Ok(salt)
    }

    fn write_private(path: &Path, contents: &[u8]) -> Result<(), SecurityError> {
        let mut file = File::create(path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(())
    }

    fn cached_handles(&self) -> Result<MutexGuard<'_, HashMap<String, KeyHandle>>, SecurityError> {
        self.handles
            .lock()
            .map_err(|_| SecurityError::key_store("File key store cache poisoned"))
    }

    fn unwrap_key(&self, alias: &str, path: &Path) -> Result<KeyHandle, SecurityError> {
        let record: PersistedKey = serde_json::from_slice(&fs::read(path)?)
            .map_err(|_| SecurityError::key_store("Corrupt key store record"))?;
        if record.version != RECORD_VERSION {
            return Err(SecurityError::key_store(format!(
                "Unsupported key record version: {}",
                record.version
            )));
        }

        let nonce = STANDARD
            .decode(&record.nonce)
            .map_err(|_| SecurityError::key_store("Corrupt key store record"))?;
        let wrapped = STANDARD
            .decode(&record.wrapped)
            .map_err(|_| SecurityError::key_store("Corrupt key store record"))?;
        if nonce.len() != IV_SIZE {
            return Err(SecurityError::key_store("Corrupt key store record"));
        }

        let salt = self.read_salt(alias)?;
        let wrapping_key = self.derive_wrapping_key(&salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*wrapping_key));
        let material = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: &wrapped,
                        aad: alias.as_bytes(),
                    },
                )
                .map_err(|_| SecurityError::key_store("Failed to unwrap key material"))?,
        );

        KeyHandle::from_key_material(alias, &material, record.spec)
    }

    fn remove_if_present(path: &Path) -> Result<(), SecurityError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl HardwareKeyStore for SecureFileKeyStore {
    fn key_exists(&self, alias: &str) -> Result<bool, SecurityError> {
        Ok(self.key_path(alias).exists())
    }

    fn generate_symmetric_key(&self, alias: &str, spec: &KeySpec) -> Result<(), SecurityError> {
        spec.validate()?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SecurityError::key_store("File key store lock poisoned"))?;

        if self.key_exists(alias)? {
            return Err(SecurityError::key_store(format!("Key alias already exists: {}", alias)));
        }

        let mut salt = [0u8; KEYSTORE_SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        let wrapping_key = self.derive_wrapping_key(&salt)?;

        let mut material = Zeroizing::new([0u8; AES_KEY_SIZE]);
        OsRng.fill_bytes(&mut *material);

        let mut nonce = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*wrapping_key));
        let wrapped = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &*material,
                    aad: alias.as_bytes(),
                },
            )
            .map_err(|_| SecurityError::key_store("Failed to wrap key material"))?;

        let record = PersistedKey {
            version: RECORD_VERSION,
            spec: spec.clone(),
            nonce: STANDARD.encode(nonce),
            wrapped: STANDARD.encode(&wrapped),
        };

        // Salt first: a key file without its salt would be unreadable
        Self::write_private(&self.salt_path(alias), &salt)?;
        Self::write_private(&self.key_path(alias), &serde_json::to_vec(&record)?)?;

        log::info!("Generated file-backed key under alias {}", alias);
        Ok(())
    }

    fn get_key_handle(&self, alias: &str) -> Result<KeyHandle, SecurityError> {
        let path = self.key_path(alias);
        if !path.exists() {
            return Err(SecurityError::key_store(format!("Key alias not found: {}", alias)));
        }

        if let Some(handle) = self.cached_handles()?.get(alias) {
            return Ok(handle.clone());
        }

        let handle = self.unwrap_key(alias, &path)?;
        self.cached_handles()?.insert(alias.to_string(), handle.clone());
        Ok(handle)
    }

    fn delete_key(&self, alias: &str) -> Result<(), SecurityError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SecurityError::key_store("File key store lock poisoned"))?;
        self.cached_handles()?.remove(alias);
        Self::remove_if_present(&self.key_path(alias))?;
        Self::remove_if_present(&self.salt_path(alias))?;
        log::info!("Deleted file-backed key under alias {}", alias);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Cheap parameters keep the suite fast; production uses KdfParams::default()
    fn fast_kdf() -> KdfParams {
        KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn open_store(dir: &TempDir, passphrase: &str) -> SecureFileKeyStore {
        SecureFileKeyStore::with_kdf_params(dir.path(), passphrase, fast_kdf())
            .expect("Failed to open file key store")
    }

    #[test]
    fn test_generate_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "correct horse");
        store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(true)).unwrap();
        let (iv, ciphertext) = store.get_key_handle("master").unwrap().encrypt(b"persist").unwrap();
        drop(store);

        let reopened = open_store(&dir, "correct horse");
        assert!(reopened.key_exists("master").unwrap());
        let handle = reopened.get_key_handle("master").unwrap();
        assert!(handle.spec().require_authentication);
        assert_eq!(handle.decrypt(&iv, &ciphertext).unwrap(), b"persist");
    }

    #[test]
    fn test_wrong_passphrase_cannot_unwrap() {
        let dir = TempDir::new().unwrap();
        open_store(&dir, "correct horse")
            .generate_symmetric_key("master", &KeySpec::aes_gcm_256(false))
            .unwrap();

        let wrong = open_store(&dir, "battery staple");
        assert!(matches!(wrong.get_key_handle("master"), Err(SecurityError::KeyStore(_))));
    }

    #[test]
    fn test_existing_alias_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pw");
        store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(false)).unwrap();
        let before = fs::read(store.key_path("master")).unwrap();

        assert!(store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(false)).is_err());
        assert_eq!(fs::read(store.key_path("master")).unwrap(), before);
    }

    #[test]
    fn test_file_names_do_not_reveal_alias() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pw");
        store.generate_symmetric_key("soulon_master_key", &KeySpec::aes_gcm_256(false)).unwrap();
        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().into_string().unwrap();
            assert!(!name.contains("soulon"));
        }
    }

    #[test]
    fn test_record_bound_to_alias() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pw");
        store.generate_symmetric_key("a", &KeySpec::aes_gcm_256(false)).unwrap();
        fs::copy(store.key_path("a"), store.key_path("b")).unwrap();
        fs::copy(store.salt_path("a"), store.salt_path("b")).unwrap();
        assert!(store.get_key_handle("b").is_err());
    }

    #[test]
    fn test_delete_removes_files() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pw");
        store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(false)).unwrap();
        store.delete_key("master").unwrap();
        assert!(!store.key_exists("master").unwrap());
        assert!(!store.salt_path("master").exists());
        store.delete_key("master").expect("Deleting a missing alias should succeed");
    }

    #[test]
    fn test_unwrapped_handle_is_cached() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pw");
        store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(false)).unwrap();
        let (iv, ciphertext) = store.get_key_handle("master").unwrap().encrypt(b"cached").unwrap();

        // A second lookup no longer needs the salt to re-derive the wrapping key
        fs::remove_file(store.salt_path("master")).unwrap();
        let handle = store.get_key_handle("master").unwrap();
        assert_eq!(handle.decrypt(&iv, &ciphertext).unwrap(), b"cached");
    }

    #[test]
    fn test_delete_drops_cached_handle() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pw");
        store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(false)).unwrap();
        let (iv, ciphertext) = store.get_key_handle("master").unwrap().encrypt(b"old key").unwrap();

        store.delete_key("master").unwrap();
        assert!(matches!(store.get_key_handle("master"), Err(SecurityError::KeyStore(_))));

        store.generate_symmetric_key("master", &KeySpec::aes_gcm_256(false)).unwrap();
        let fresh = store.get_key_handle("master").unwrap();
        assert!(fresh.decrypt(&iv, &ciphertext).is_err());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(SecureFileKeyStore::new(dir.path(), "").is_err());
    }
}
