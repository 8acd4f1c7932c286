//! Passphrase validation and advisory strength scoring.

use crate::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};

/// Minimum passphrase length, in characters.
pub const MIN_PASSPHRASE_LEN: usize = 4;

/// Rejects passphrases that are too short. Any characters are allowed.
pub fn validate_passphrase(passphrase: &str) -> CryptoResult<()> {
    let len = passphrase.chars().count();
    if len < MIN_PASSPHRASE_LEN {
        return Err(CryptoError::InvalidPassphrase(format!(
            "must be at least {MIN_PASSPHRASE_LEN} characters, got {len}"
        )));
    }
    Ok(())
}

/// Advisory strength classification. Affects nothing that is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassphraseStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

impl PassphraseStrength {
    pub fn of(passphrase: &str) -> Self {
        let len = passphrase.chars().count();
        if len < 4 {
            return PassphraseStrength::Weak;
        }
        if len < 8 {
            return PassphraseStrength::Fair;
        }

        let mut score = if len >= 12 { 2 } else { 1 };
        if passphrase.chars().any(|c| c.is_ascii_lowercase()) {
            score += 1;
        }
        if passphrase.chars().any(|c| c.is_ascii_uppercase()) {
            score += 1;
        }
        if passphrase.chars().any(|c| c.is_ascii_digit()) {
            score += 1;
        }
        if passphrase.chars().any(|c| !c.is_ascii_alphanumeric()) {
            score += 1;
        }

        match score {
            s if s >= 5 => PassphraseStrength::Strong,
            s if s >= 3 => PassphraseStrength::Good,
            _ => PassphraseStrength::Fair,
        }
    }
}
