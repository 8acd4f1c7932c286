//! Self-contained passphrase envelopes.
//!
//! A [`CipherEnvelope`] carries everything needed to decrypt it except the
//! passphrase: format version, KDF parameters, salt, nonce and ciphertext.
//! Every call to [`encrypt_with_passphrase`] uses a fresh salt and nonce, so
//! encrypting the same plaintext twice never yields the same envelope.

use crate::cipher::{self, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, DerivedKey, KdfParams, Salt};
use serde::{Deserialize, Serialize};

/// Serialized envelope layout version.
pub const ENVELOPE_VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherEnvelope {
    #[serde(rename = "v")]
    pub version: u8,
    pub kdf: KdfParams,
    #[serde(with = "crate::b64")]
    pub salt: Vec<u8>,
    #[serde(flatten)]
    pub encrypted: EncryptedData,
}

impl CipherEnvelope {
    /// Builds an envelope from an already derived key.
    pub(crate) fn seal_with_key(
        key: &DerivedKey,
        salt: &Salt,
        kdf: KdfParams,
        plaintext: &[u8],
    ) -> CryptoResult<Self> {
        Ok(Self {
            version: ENVELOPE_VERSION,
            kdf,
            salt: salt.as_bytes().to_vec(),
            encrypted: cipher::encrypt(key, plaintext)?,
        })
    }

    /// Checks version and salt before any KDF work is attempted.
    pub fn check_format(&self) -> CryptoResult<Salt> {
        if self.version != ENVELOPE_VERSION {
            return Err(CryptoError::MalformedEnvelope(format!(
                "unsupported envelope version {}",
                self.version
            )));
        }
        self.kdf.validate()?;
        Salt::try_from(self.salt.as_slice())
    }

    /// Compact JSON string form (used for export bundles).
    pub fn encode(&self) -> CryptoResult<String> {
        serde_json::to_string(self).map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Parses the string form produced by [`CipherEnvelope::encode`].
    pub fn decode(text: &str) -> CryptoResult<Self> {
        serde_json::from_str(text).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }
}

/// Encrypts `plaintext` under `passphrase` with a fresh salt and nonce.
pub fn encrypt_with_passphrase(
    plaintext: &[u8],
    passphrase: &str,
    params: &KdfParams,
) -> CryptoResult<CipherEnvelope> {
    crate::validate_passphrase(passphrase)?;
    let salt = Salt::random();
    let key = derive_key(passphrase, &salt, params)?;
    CipherEnvelope::seal_with_key(&key, &salt, *params, plaintext)
}

/// Decrypts an envelope. Fails with [`CryptoError::Decryption`] on a wrong
/// passphrase or tampered data, [`CryptoError::MalformedEnvelope`] when the
/// envelope itself is unusable.
pub fn decrypt_with_passphrase(
    envelope: &CipherEnvelope,
    passphrase: &str,
) -> CryptoResult<Vec<u8>> {
    let salt = envelope.check_format()?;
    let key = derive_key(passphrase, &salt, &envelope.kdf)?;
    cipher::decrypt(&key, &envelope.encrypted)
}
