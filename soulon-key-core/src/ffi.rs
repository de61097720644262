//! FFI bindings for the key core
//!
//! C-compatible entry points for the operations that need neither a key store
//! nor a presence prompt: seed derivation, hashing and wallet-key envelopes.
//! Gated decryption stays on the host side, which owns the prompt UI.
//!
//! SECURITY: results carry public data or ciphertext only. Error codes come
//! from [`SecurityError::code`] and never include input material.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use zeroize::Zeroizing;

use crate::core::crypto::encryption::{EncryptedEnvelope, EnvelopeCipher};
use crate::core::crypto::hashing::HashManager;
use crate::core::crypto::keys::{HdKeyDeriver, WalletDerivedKey};
use crate::shared::constants::MIN_ENVELOPE_SIZE;
use crate::shared::error::SecurityError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

const ERROR_STRING_CONVERSION: i32 = 10;
const MAX_WALLET_ID_LENGTH: usize = 4096;
/// Largest plaintext accepted by the wallet-key entry points
pub const MAX_FFI_PLAINTEXT_LENGTH: usize = 1024 * 1024;
// Base64 length of an envelope sealing MAX_FFI_PLAINTEXT_LENGTH bytes
const MAX_ENVELOPE_BASE64_LENGTH: usize = (MIN_ENVELOPE_SIZE + MAX_FFI_PLAINTEXT_LENGTH).div_ceil(3) * 4;

/// Secure FFI result wrapper
#[repr(C)]
pub struct SecureResult {
    success: bool,
    data: *mut c_char,
    error_code: i32,
}

impl SecureResult {
    fn success(data: String) -> Self {
        match CString::new(data) {
            Ok(c_string) => Self {
                success: true,
                data: c_string.into_raw(),
                error_code: 0,
            },
            Err(_) => Self::error(ERROR_STRING_CONVERSION),
        }
    }

    fn error(error_code: i32) -> Self {
        Self {
            success: false,
            data: ptr::null_mut(),
            error_code,
        }
    }

    fn from_result(result: Result<String, SecurityError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => {
                log::debug!("FFI call failed with code {}", e.code());
                Self::error(e.code())
            }
        }
    }
}

fn read_str<'a>(input: *const c_char, max_len: usize) -> Result<&'a str, SecurityError> {
    if input.is_null() {
        return Err(SecurityError::invalid_input("Null input pointer"));
    }
    let input = unsafe { CStr::from_ptr(input) }
        .to_str()
        .map_err(|_| SecurityError::invalid_input("Invalid UTF-8 input"))?;
    if input.len() > max_len {
        return Err(SecurityError::invalid_input("Input too long"));
    }
    Ok(input)
}

fn read_bytes<'a>(data: *const u8, len: usize) -> Result<&'a [u8], SecurityError> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(SecurityError::invalid_input("Null data pointer"));
    }
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Derive the application key from raw seed bytes; returns the compressed public key as hex
#[no_mangle]
pub extern "C" fn soulon_derive_public_key(seed: *const u8, seed_len: usize) -> SecureResult {
    SecureResult::from_result((|| -> Result<String, SecurityError> {
        let seed = read_bytes(seed, seed_len)?;
        let key = HdKeyDeriver::new()?.derive_key_from_seed(seed)?;
        Ok(hex::encode(key.get_public_key_bytes()))
    })())
}

/// SHA-256 of `data`, as hex
#[no_mangle]
pub extern "C" fn soulon_generate_hash(data: *const u8, data_len: usize) -> SecureResult {
    SecureResult::from_result(
        read_bytes(data, data_len).map(|data| HashManager::new().generate_hash_hex(data)),
    )
}

/// Encrypt under the key derived from `wallet_public_id`; returns a base64 envelope
#[no_mangle]
pub extern "C" fn soulon_encrypt_with_wallet_key(
    wallet_public_id: *const c_char,
    plaintext: *const u8,
    plaintext_len: usize,
) -> SecureResult {
    SecureResult::from_result((|| -> Result<String, SecurityError> {
        if plaintext_len > MAX_FFI_PLAINTEXT_LENGTH {
            return Err(SecurityError::invalid_input("Plaintext too long"));
        }
        let key = WalletDerivedKey::derive(read_str(wallet_public_id, MAX_WALLET_ID_LENGTH)?)?;
        let plaintext = read_bytes(plaintext, plaintext_len)?;
        EnvelopeCipher::new()
            .encrypt_with_wallet_key(&key, plaintext)?
            .to_base64()
    })())
}

/// Decrypt a base64 envelope; returns the plaintext as base64
#[no_mangle]
pub extern "C" fn soulon_decrypt_with_wallet_key(
    wallet_public_id: *const c_char,
    envelope_base64: *const c_char,
) -> SecureResult {
    SecureResult::from_result((|| -> Result<String, SecurityError> {
        let key = WalletDerivedKey::derive(read_str(wallet_public_id, MAX_WALLET_ID_LENGTH)?)?;
        let envelope = EncryptedEnvelope::from_base64(read_str(envelope_base64, MAX_ENVELOPE_BASE64_LENGTH)?)?;
        let plaintext = Zeroizing::new(EnvelopeCipher::new().decrypt_with_wallet_key(&key, &envelope)?);
        Ok(STANDARD.encode(&*plaintext))
    })())
}

/// Free a string returned in a [`SecureResult`]
#[no_mangle]
pub extern "C" fn soulon_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            drop(CString::from_raw(ptr));
        }
    }
}

/// Free the data held by a [`SecureResult`] and null it out
#[no_mangle]
pub extern "C" fn soulon_free_result(result: *mut SecureResult) {
    if !result.is_null() {
        unsafe {
            let result_ref = &mut *result;
            if !result_ref.data.is_null() {
                drop(CString::from_raw(result_ref.data));
                result_ref.data = ptr::null_mut();
            }
        }
    }
}
