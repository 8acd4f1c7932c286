//! Encryption layer for Sakinah.
//!
//! Provides passphrase-based encryption using:
//! - Argon2id (or PBKDF2-HMAC-SHA256 for older data) for key derivation
//! - ChaCha20-Poly1305 for authenticated encryption
//! - Zeroization of passphrases and derived keys
//!
//! # Architecture
//!
//! Derived keys are never persisted. Every ciphertext is wrapped in a
//! [`CipherEnvelope`] that embeds its KDF parameters, salt and nonce, so the
//! passphrase alone is enough to open it.
//!
//! Bulk work goes through a [`CryptoContext`], an explicit per-operation
//! object that caches derived keys for the duration of one save or load.

mod b64;
mod cipher;
mod context;
pub mod envelope;
mod error;
mod key;
mod passphrase;

pub use cipher::{
    decrypt, decrypt_string, encrypt, encrypt_string, EncryptedData, NONCE_SIZE, TAG_SIZE,
};
pub use context::CryptoContext;
pub use envelope::{decrypt_with_passphrase, encrypt_with_passphrase, CipherEnvelope};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, PBKDF2_MIN_ITERATIONS,
    SALT_SIZE,
};
pub use passphrase::{validate_passphrase, PassphraseStrength, MIN_PASSPHRASE_LEN};
