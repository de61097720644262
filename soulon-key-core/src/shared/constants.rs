//! Constants for the key core
//!
//! Every cryptographic parameter of the subsystem is fixed here. None of these
//! values are runtime-configurable; see `shared::settings` for the ambient settings
//! that are.

// Key store aliases
pub const MASTER_KEY_ALIAS: &str = "soulon_master_key";
pub const KEYSTORE_DIR_NAME: &str = "soulon";
pub const KEYSTORE_FILE_EXTENSION: &str = "key";
pub const KEYSTORE_SALT_EXTENSION: &str = "salt";

// AES parameters
pub const AES_KEY_SIZE: usize = 32;
pub const AES_KEY_SIZE_BITS: u32 = 256;
pub const IV_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;
pub const TAG_SIZE_BITS: u32 = 128;
pub const HASH_SIZE: usize = 32;

// Hierarchical derivation
pub const MIN_SEED_SIZE: usize = 16;
pub const BIP32_SEED_KEY: &[u8] = b"Bitcoin seed";
pub const HARDENED_OFFSET: u32 = 0x8000_0000;
pub const PURPOSE_INDEX: u32 = 44;
pub const COIN_TYPE_INDEX: u32 = 501;
pub const DEPLOYMENT_YEAR_INDEX: u32 = 2026;
pub const APPLICATION_INDEX: u32 = 101;
pub const DERIVATION_PATH: [u32; 4] = [
    PURPOSE_INDEX,
    COIN_TYPE_INDEX,
    DEPLOYMENT_YEAR_INDEX,
    APPLICATION_INDEX,
];
pub const PRIVATE_KEY_SIZE: usize = 32;
pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
pub const CHAIN_CODE_SIZE: usize = 32;

// Wallet-derived keys
pub const WALLET_KEY_SALT: &[u8] = b"soulon-wallet-key-v1";

// Envelope wire format
pub const LENGTH_PREFIX_SIZE: usize = 4;
pub const TIMESTAMP_SIZE: usize = 8;
pub const MIN_ENVELOPE_SIZE: usize =
    LENGTH_PREFIX_SIZE + IV_SIZE + LENGTH_PREFIX_SIZE + TAG_SIZE + TIMESTAMP_SIZE;

// Self-test
pub const SELF_TEST_PLAINTEXT: &[u8] = b"soulon-self-test";

// Presence prompt defaults
pub const DEFAULT_PROMPT_TITLE: &str = "Unlock Soulon";
pub const DEFAULT_PROMPT_SUBTITLE: &str = "Confirm it's you to decrypt your data";
pub const AUTH_EVENT_BUFFER: usize = 8;

// Device credential
pub const MAX_CREDENTIAL_ATTEMPTS: u32 = 5;
pub const ARGON2_MEMORY_COST: u32 = 65536; // 64MB
pub const ARGON2_TIME_COST: u32 = 3;
pub const ARGON2_PARALLELISM: u32 = 1;
pub const KEYSTORE_SALT_SIZE: usize = 32;

// Authentication error codes reported by authenticators
pub const AUTH_ERROR_HW_UNAVAILABLE: i32 = 1;
pub const AUTH_ERROR_TIMEOUT: i32 = 3;
pub const AUTH_ERROR_LOCKOUT: i32 = 7;
pub const AUTH_ERROR_BINDING_MISMATCH: i32 = 100;

// Build information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
