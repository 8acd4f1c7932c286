//! Passphrase-based key derivation.
//!
//! Argon2id is the standard scheme. PBKDF2-HMAC-SHA256 is kept so that vaults
//! written with it stay readable; anything under 100k iterations is treated as
//! legacy and gets upgraded on the next successful login.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a derived key in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

/// Size of a KDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Minimum PBKDF2 iteration count that is not considered legacy.
pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

// Upper bounds for parameters read back from untrusted envelopes.
const MAX_ARGON2_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ARGON2_ITERATIONS: u32 = 64;
const MAX_ARGON2_PARALLELISM: u32 = 16;
const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;

/// Key derivation parameters, stored alongside every envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "alg", rename_all = "kebab-case")]
pub enum KdfParams {
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
    Pbkdf2Sha256 { iterations: u32 },
}

impl Default for KdfParams {
    /// OWASP baseline for Argon2id: 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        KdfParams::Argon2id {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use these for a real vault.
    pub fn fast_for_tests() -> Self {
        KdfParams::Argon2id {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// PBKDF2-HMAC-SHA256 with the recommended minimum work factor.
    pub fn pbkdf2_default() -> Self {
        KdfParams::Pbkdf2Sha256 {
            iterations: PBKDF2_MIN_ITERATIONS,
        }
    }

    /// Whether these parameters come from the weak legacy scheme.
    pub fn is_legacy(&self) -> bool {
        matches!(
            self,
            KdfParams::Pbkdf2Sha256 { iterations } if *iterations < PBKDF2_MIN_ITERATIONS
        )
    }

    /// Rejects parameters that are unusable or absurdly expensive.
    pub fn validate(&self) -> CryptoResult<()> {
        match *self {
            KdfParams::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                if parallelism == 0 || parallelism > MAX_ARGON2_PARALLELISM {
                    return Err(CryptoError::UnsupportedKdf(format!(
                        "argon2 parallelism {parallelism} out of range"
                    )));
                }
                if iterations == 0 || iterations > MAX_ARGON2_ITERATIONS {
                    return Err(CryptoError::UnsupportedKdf(format!(
                        "argon2 iterations {iterations} out of range"
                    )));
                }
                if memory_kib < 8 * parallelism || memory_kib > MAX_ARGON2_MEMORY_KIB {
                    return Err(CryptoError::UnsupportedKdf(format!(
                        "argon2 memory {memory_kib} KiB out of range"
                    )));
                }
                Ok(())
            }
            KdfParams::Pbkdf2Sha256 { iterations } => {
                if iterations == 0 || iterations > MAX_PBKDF2_ITERATIONS {
                    return Err(CryptoError::UnsupportedKdf(format!(
                        "pbkdf2 iterations {iterations} out of range"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Random salt for key derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Generates a fresh random salt.
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Salt {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SALT_SIZE] = bytes
            .try_into()
            .map_err(|_| {
                CryptoError::MalformedEnvelope(format!(
                    "salt must be {SALT_SIZE} bytes, got {}",
                    bytes.len()
                ))
            })?;
        Ok(Self(arr))
    }
}

/// A 256-bit symmetric key. Zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derives a key from a passphrase. Deterministic for identical inputs.
pub fn derive_key(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    params.validate()?;
    let mut out = [0u8; KEY_SIZE];

    match *params {
        KdfParams::Argon2id {
            memory_kib,
            iterations,
            parallelism,
        } => {
            let argon_params = Params::new(memory_kib, iterations, parallelism, Some(KEY_SIZE))
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params)
                .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut out)
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        }
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(
                passphrase.as_bytes(),
                salt.as_bytes(),
                iterations,
                &mut out,
            );
        }
    }

    let key = DerivedKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Generates a random key (not derived from any passphrase).
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    let key = DerivedKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = Salt::random();
        let params = KdfParams::fast_for_tests();
        let a = derive_key("correcthorse", &salt, &params).unwrap();
        let b = derive_key("correcthorse", &salt, &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_gives_different_key() {
        let params = KdfParams::fast_for_tests();
        let a = derive_key("correcthorse", &Salt::random(), &params).unwrap();
        let b = derive_key("correcthorse", &Salt::random(), &params).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn pbkdf2_matches_scheme_and_differs_from_argon() {
        let salt = Salt::from_bytes([7u8; SALT_SIZE]);
        let legacy = KdfParams::Pbkdf2Sha256 { iterations: 1000 };
        let pbkdf2 = derive_key("pw", &salt, &legacy).unwrap();
        let again = derive_key("pw", &salt, &legacy).unwrap();
        let argon = derive_key("pw", &salt, &KdfParams::fast_for_tests()).unwrap();
        assert_eq!(pbkdf2.as_bytes(), again.as_bytes());
        assert_ne!(pbkdf2.as_bytes(), argon.as_bytes());
    }

    #[test]
    fn legacy_detection() {
        assert!(KdfParams::Pbkdf2Sha256 { iterations: 1000 }.is_legacy());
        assert!(!KdfParams::pbkdf2_default().is_legacy());
        assert!(!KdfParams::default().is_legacy());
    }

    #[test]
    fn absurd_params_rejected() {
        let huge = KdfParams::Argon2id {
            memory_kib: u32::MAX,
            iterations: 2,
            parallelism: 1,
        };
        assert!(matches!(huge.validate(), Err(CryptoError::UnsupportedKdf(_))));
        assert!(KdfParams::Pbkdf2Sha256 { iterations: 0 }.validate().is_err());
        assert!(KdfParams::default().validate().is_ok());
    }

    #[test]
    fn params_serialize_with_algorithm_tag() {
        let json = serde_json::to_string(&KdfParams::pbkdf2_default()).unwrap();
        assert_eq!(json, r#"{"alg":"pbkdf2-sha256","iterations":100000}"#);
        let back: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, KdfParams::pbkdf2_default());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = generate_random_key();
        assert_eq!(format!("{key:?}"), "DerivedKey(..)");
    }
}
