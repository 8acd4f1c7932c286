//! Per-operation crypto context.
//!
//! A `CryptoContext` lives for exactly one unit of work (one save, one load,
//! one rotation). It holds the passphrase and caches derived keys so that a
//! vault with hundreds of sealed fields costs one KDF run instead of hundreds.
//! Nothing here is global; dropping the context zeroizes the passphrase and
//! every cached key.

use crate::cipher;
use crate::envelope::CipherEnvelope;
use crate::error::CryptoResult;
use crate::key::{derive_key, DerivedKey, KdfParams, Salt};
use std::collections::HashMap;
use zeroize::Zeroizing;

pub struct CryptoContext {
    passphrase: Zeroizing<String>,
    params: KdfParams,
    seal_salt: Salt,
    keys: HashMap<(Salt, KdfParams), DerivedKey>,
}

impl CryptoContext {
    /// Creates a context that seals with `params`. Validates the passphrase.
    pub fn new(passphrase: &str, params: KdfParams) -> CryptoResult<Self> {
        crate::validate_passphrase(passphrase)?;
        params.validate()?;
        Ok(Self {
            passphrase: Zeroizing::new(passphrase.to_string()),
            params,
            seal_salt: Salt::random(),
            keys: HashMap::new(),
        })
    }

    /// Parameters used for newly sealed envelopes.
    pub fn params(&self) -> KdfParams {
        self.params
    }

    fn key_for(&mut self, salt: Salt, params: KdfParams) -> CryptoResult<&DerivedKey> {
        if !self.keys.contains_key(&(salt, params)) {
            let key = derive_key(&self.passphrase, &salt, &params)?;
            self.keys.insert((salt, params), key);
        }
        Ok(&self.keys[&(salt, params)])
    }

    /// Seals `plaintext`. The salt is shared within this context, the nonce
    /// is fresh for every call.
    pub fn seal(&mut self, plaintext: &[u8]) -> CryptoResult<CipherEnvelope> {
        let (salt, params) = (self.seal_salt, self.params);
        let key = self.key_for(salt, params)?.clone();
        CipherEnvelope::seal_with_key(&key, &salt, params, plaintext)
    }

    pub fn seal_str(&mut self, plaintext: &str) -> CryptoResult<CipherEnvelope> {
        self.seal(plaintext.as_bytes())
    }

    /// Opens any envelope sealed under this context's passphrase.
    pub fn open(&mut self, envelope: &CipherEnvelope) -> CryptoResult<Vec<u8>> {
        let salt = envelope.check_format()?;
        let key = self.key_for(salt, envelope.kdf)?;
        cipher::decrypt(key, &envelope.encrypted)
    }

    pub fn open_string(&mut self, envelope: &CipherEnvelope) -> CryptoResult<String> {
        let bytes = self.open(envelope)?;
        String::from_utf8(bytes)
            .map_err(|_| crate::CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
    }

    /// Number of distinct keys derived so far.
    pub fn derived_key_count(&self) -> usize {
        self.keys.len()
    }
}

impl std::fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("params", &self.params)
            .field("cached_keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{decrypt_with_passphrase, encrypt_with_passphrase};

    #[test]
    fn many_seals_derive_once() {
        let mut ctx = CryptoContext::new("correcthorse", KdfParams::fast_for_tests()).unwrap();
        let a = ctx.seal_str("one").unwrap();
        let b = ctx.seal_str("one").unwrap();
        assert_eq!(ctx.derived_key_count(), 1);
        assert_ne!(a.encrypted.nonce, b.encrypted.nonce);
        assert_ne!(a.encrypted.ciphertext, b.encrypted.ciphertext);
    }

    #[test]
    fn context_envelopes_are_self_contained() {
        let mut ctx = CryptoContext::new("correcthorse", KdfParams::fast_for_tests()).unwrap();
        let env = ctx.seal_str("notes").unwrap();
        drop(ctx);
        assert_eq!(decrypt_with_passphrase(&env, "correcthorse").unwrap(), b"notes");
    }

    #[test]
    fn opens_foreign_envelopes() {
        let legacy = KdfParams::Pbkdf2Sha256 { iterations: 1000 };
        let env = encrypt_with_passphrase(b"x", "correcthorse", &legacy).unwrap();
        let mut ctx = CryptoContext::new("correcthorse", KdfParams::fast_for_tests()).unwrap();
        assert_eq!(ctx.open(&env).unwrap(), b"x");
        assert!(CryptoContext::new("wrong-pass", KdfParams::fast_for_tests())
            .unwrap()
            .open(&env)
            .unwrap_err()
            .is_authentication_failure());
    }

    #[test]
    fn short_passphrase_rejected() {
        assert!(CryptoContext::new("abc", KdfParams::fast_for_tests()).is_err());
    }
}
