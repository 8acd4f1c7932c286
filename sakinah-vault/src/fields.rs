//! At-rest representation of sensitive entry fields.
//!
//! A stored entry row is the entry's JSON with each sensitive string field
//! replaced by a [`FieldValue`]. Sealed fields are `{"sealed": "<envelope>"}`,
//! plain ones stay bare strings, so older plaintext rows load unchanged.

use sakinah_crypto::{CipherEnvelope, CryptoContext, CryptoError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{VaultError, VaultResult};

pub const NOTES_PLACEHOLDER: &str = "[Encrypted - Please re-enter PIN]";
pub const CONTENT_PLACEHOLDER: &str = "[Encrypted content - Please re-enter PIN to view]";
pub const TITLE_PLACEHOLDER: &str = "[Encrypted title]";

/// Sensitive fields of a mood row and what to show when they cannot be opened.
pub(crate) const MOOD_FIELDS: &[(&str, &str)] = &[("notes", NOTES_PLACEHOLDER)];
pub(crate) const JOURNAL_FIELDS: &[(&str, &str)] = &[
    ("content", CONTENT_PLACEHOLDER),
    ("title", TITLE_PLACEHOLDER),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Sealed { sealed: String },
    Plain(String),
}

impl FieldValue {
    pub fn seal(ctx: &mut CryptoContext, plaintext: &str) -> VaultResult<Self> {
        let sealed = ctx.seal_str(plaintext)?.encode()?;
        Ok(FieldValue::Sealed { sealed })
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, FieldValue::Sealed { .. })
    }

    /// Plaintext of this field. A plain value is returned as-is.
    pub fn open(&self, ctx: &mut CryptoContext) -> Result<String, CryptoError> {
        match self {
            FieldValue::Plain(text) => Ok(text.clone()),
            FieldValue::Sealed { sealed } => {
                let envelope = CipherEnvelope::decode(sealed)?;
                ctx.open_string(&envelope)
            }
        }
    }
}

/// Replaces each named string field of `data` with a sealed [`FieldValue`].
pub(crate) fn seal_fields(
    ctx: &mut CryptoContext,
    data: &mut Value,
    fields: &[&str],
) -> VaultResult<()> {
    for field in fields {
        let Some(slot) = data.get_mut(*field) else {
            continue;
        };
        if let Value::String(text) = slot {
            let sealed = FieldValue::seal(ctx, text)?;
            *slot = serde_json::to_value(sealed)?;
        }
    }
    Ok(())
}

/// Opens every sensitive field of a stored row in place. A field that cannot
/// be opened becomes its placeholder; the rest of the row is unaffected.
pub(crate) fn open_fields(
    ctx: &mut CryptoContext,
    data: &mut Value,
    fields: &[(&str, &str)],
    entry_id: &str,
) {
    for (field, placeholder) in fields {
        let Some(slot) = data.get_mut(*field) else {
            continue;
        };
        if slot.is_null() {
            continue;
        }
        let opened = serde_json::from_value::<FieldValue>(slot.take())
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
            .and_then(|value| value.open(ctx));
        *slot = match opened {
            Ok(text) => Value::String(text),
            Err(e) => {
                tracing::warn!(
                    entry = entry_id,
                    field = *field,
                    error = %e,
                    "field could not be decrypted"
                );
                Value::String((*placeholder).to_string())
            }
        };
    }
}

/// Re-seals every openable sealed field under `new_ctx`, checking each new
/// envelope with `check`. Fields that no longer open under `old_ctx` are kept
/// verbatim.
pub(crate) fn reseal_fields(
    old_ctx: &mut CryptoContext,
    new_ctx: &mut CryptoContext,
    check: &mut CryptoContext,
    data: &mut Value,
    fields: &[(&str, &str)],
    entry_id: &str,
) -> VaultResult<()> {
    for (field, _) in fields {
        let Some(slot) = data.get_mut(*field) else {
            continue;
        };
        let Ok(value) = serde_json::from_value::<FieldValue>(slot.clone()) else {
            continue;
        };
        if !value.is_sealed() {
            continue;
        }
        let plaintext = match value.open(old_ctx) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    entry = entry_id,
                    field = *field,
                    error = %e,
                    "carrying undecryptable field over unchanged"
                );
                continue;
            }
        };
        let resealed = FieldValue::seal(new_ctx, &plaintext)?;
        if resealed.open(check).ok().as_deref() != Some(plaintext.as_str()) {
            return Err(VaultError::RotationFailed(format!(
                "re-encrypted {field} of {entry_id} did not verify"
            )));
        }
        *slot = serde_json::to_value(resealed)?;
    }
    Ok(())
}
