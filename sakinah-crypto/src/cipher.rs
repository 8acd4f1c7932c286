//! Key-level authenticated encryption (ChaCha20-Poly1305).

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Nonce size in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Nonce plus ciphertext (tag appended).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    #[serde(with = "crate::b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "crate::b64")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Total encrypted size in bytes.
    pub fn len(&self) -> usize {
        self.nonce.len() + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

/// Encrypts `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypts and authenticates `data`. Never returns unauthenticated bytes.
pub fn decrypt(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    if data.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::MalformedEnvelope(format!(
            "nonce must be {NONCE_SIZE} bytes, got {}",
            data.nonce.len()
        )));
    }
    if data.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::MalformedEnvelope(format!(
            "ciphertext shorter than the {TAG_SIZE}-byte tag"
        )));
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&data.nonce), data.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}

/// Encrypts a UTF-8 string.
pub fn encrypt_string(key: &DerivedKey, plaintext: &str) -> CryptoResult<EncryptedData> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypts into a UTF-8 string.
pub fn decrypt_string(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<String> {
    let bytes = decrypt(key, data)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_random_key;

    #[test]
    fn roundtrip() {
        let key = generate_random_key();
        let enc = encrypt(&key, b"felt productive").unwrap();
        assert_eq!(decrypt(&key, &enc).unwrap(), b"felt productive");
    }

    #[test]
    fn wrong_key_is_detected() {
        let enc = encrypt(&generate_random_key(), b"secret").unwrap();
        let err = decrypt(&generate_random_key(), &enc).unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn tampered_ciphertext_is_detected() {
        let key = generate_random_key();
        let mut enc = encrypt(&key, b"secret").unwrap();
        enc.ciphertext[0] ^= 0x01;
        assert!(matches!(decrypt(&key, &enc), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn truncated_ciphertext_is_malformed() {
        let key = generate_random_key();
        let enc = EncryptedData {
            nonce: vec![0u8; NONCE_SIZE],
            ciphertext: vec![1, 2, 3],
        };
        assert!(matches!(decrypt(&key, &enc), Err(CryptoError::MalformedEnvelope(_))));
    }

    #[test]
    fn string_helpers() {
        let key = generate_random_key();
        let enc = encrypt_string(&key, "سكينة").unwrap();
        assert_eq!(decrypt_string(&key, &enc).unwrap(), "سكينة");
    }
}
