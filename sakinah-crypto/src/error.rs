//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during key derivation, encryption or decryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Passphrase rejected before any key derivation work was done.
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// KDF parameters outside the accepted bounds.
    #[error("unsupported KDF parameters: {0}")]
    UnsupportedKdf(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication failed: wrong passphrase, wrong key or tampered data.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The ciphertext envelope could not be parsed at all.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

impl CryptoError {
    /// Whether this failure means "wrong passphrase or corrupted data".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, CryptoError::Decryption(_))
    }
}
