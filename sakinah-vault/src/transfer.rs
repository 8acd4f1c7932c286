//! Backup export and import.
//!
//! An export bundle is a small JSON document:
//!
//! ```json
//! { "version": "1.0.0", "timestamp": "...", "appName": "Sakinah Mood Tracker",
//!   "encrypted": true, "data": "<envelope or plain vault JSON>" }
//! ```
//!
//! Importing under a different passphrase than the bundle was exported with
//! is how a passphrase can be rotated by hand.

use chrono::{DateTime, NaiveDate, Utc};
use sakinah_crypto::{
    decrypt_with_passphrase, encrypt_with_passphrase, CipherEnvelope, KdfParams,
};
use sakinah_model::VaultRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TransferError, TransferResult};
use crate::vault::SecureVault;

pub const EXPORT_VERSION: &str = "1.0.0";
pub const APP_NAME: &str = "Sakinah Mood Tracker";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub encrypted: bool,
    pub data: String,
}

impl ExportBundle {
    /// Pretty-printed JSON, the on-disk backup format.
    pub fn to_json(&self) -> TransferResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TransferError::InvalidJson(e.to_string()))
    }
}

/// What a bundle says about itself, readable without a passphrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportInfo {
    pub version: String,
    pub timestamp: Option<String>,
    pub encrypted: bool,
}

/// `sakinah-backup-<user>-<YYYY-MM-DD>-<encrypted|plain>.json`
pub fn export_filename(username: &str, encrypted: bool, date: NaiveDate) -> String {
    let suffix = if encrypted { "encrypted" } else { "plain" };
    format!("sakinah-backup-{username}-{}-{suffix}.json", date.format("%Y-%m-%d"))
}

#[derive(Clone, Debug)]
pub struct ImportExportService {
    vault: SecureVault,
    app_name: String,
}

impl ImportExportService {
    pub fn new(vault: SecureVault) -> Self {
        Self::with_app_name(vault, APP_NAME)
    }

    pub fn with_app_name(vault: SecureVault, app_name: impl Into<String>) -> Self {
        Self {
            vault,
            app_name: app_name.into(),
        }
    }

    fn kdf(&self) -> KdfParams {
        self.vault.kdf()
    }

    /// Loads the vault of `username` and wraps it in a bundle, sealed under
    /// `passphrase` when `encrypt` is set.
    pub fn export_data(
        &self,
        username: &str,
        passphrase: &str,
        encrypt: bool,
    ) -> TransferResult<ExportBundle> {
        let record = self
            .vault
            .load_user_data(username, passphrase)?
            .ok_or(TransferError::WrongPassphrase)?;
        let json = serde_json::to_string(&record)
            .map_err(|e| TransferError::InvalidUserData(e.to_string()))?;

        let data = if encrypt {
            encrypt_with_passphrase(json.as_bytes(), passphrase, &self.kdf())
                .and_then(|envelope| envelope.encode())
                .map_err(crate::VaultError::from)?
        } else {
            json
        };

        tracing::info!(user = username, encrypt, "vault exported");
        Ok(ExportBundle {
            version: EXPORT_VERSION.to_string(),
            timestamp: Utc::now(),
            app_name: self.app_name.clone(),
            encrypted: encrypt,
            data,
        })
    }

    /// Checks the bundle's shape and app name without decrypting anything.
    pub fn validate_import_file(&self, text: &str) -> TransferResult<ImportInfo> {
        let value: Value = serde_json::from_str(text).map_err(invalid_json)?;

        let version = match value.get("version").and_then(Value::as_str) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => return Err(TransferError::MissingField("version")),
        };
        let app_name = value
            .get("appName")
            .and_then(Value::as_str)
            .ok_or(TransferError::MissingField("appName"))?;
        if app_name != self.app_name {
            return Err(TransferError::WrongApp {
                expected: self.app_name.clone(),
                found: app_name.to_string(),
            });
        }
        if !value.get("data").is_some_and(Value::is_string) {
            return Err(TransferError::MissingField("data"));
        }

        Ok(ImportInfo {
            version,
            timestamp: value.get("timestamp").and_then(Value::as_str).map(str::to_string),
            encrypted: value.get("encrypted").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Decrypts a bundle with `import_passphrase` and stores it as `username`
    /// under `auth_passphrase`.
    ///
    /// Refuses to touch an existing user unless `overwrite` is set, in which
    /// case that user's rows are replaced in one transaction.
    pub fn import_data(
        &self,
        text: &str,
        import_passphrase: &str,
        username: &str,
        auth_passphrase: &str,
        overwrite: bool,
    ) -> TransferResult<VaultRecord> {
        let info = self.validate_import_file(text)?;
        let bundle: Value = serde_json::from_str(text).map_err(invalid_json)?;
        let data = bundle
            .get("data")
            .and_then(Value::as_str)
            .ok_or(TransferError::MissingField("data"))?;

        let payload = if info.encrypted {
            let envelope =
                CipherEnvelope::decode(data).map_err(|_| TransferError::DecryptionFailed)?;
            let bytes = decrypt_with_passphrase(&envelope, import_passphrase).map_err(|e| {
                tracing::warn!(error = %e, "import decryption failed");
                TransferError::DecryptionFailed
            })?;
            String::from_utf8(bytes).map_err(|_| TransferError::DecryptionFailed)?
        } else {
            data.to_string()
        };

        let mut record: VaultRecord = serde_json::from_str(&payload)
            .map_err(|e| TransferError::InvalidUserData(e.to_string()))?;

        if self.vault.user_exists(username)? && !overwrite {
            return Err(TransferError::DuplicateUser(username.to_string()));
        }

        record.user.username = username.to_string();
        let mut record = self.vault.replace_user_data(&record, auth_passphrase)?;
        record.sort_entries();

        tracing::info!(
            user = username,
            version = %info.version,
            moods = record.mood_entries.len(),
            journals = record.journal_entries.len(),
            "vault imported"
        );
        Ok(record)
    }
}

fn invalid_json(e: serde_json::Error) -> TransferError {
    TransferError::InvalidJson(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakinah_storage::RecordStore;

    fn service() -> ImportExportService {
        let store = RecordStore::open_in_memory().unwrap();
        let vault = SecureVault::new(store, KdfParams::fast_for_tests());
        ImportExportService::new(vault)
    }

    #[test]
    fn filename_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            export_filename("amir", true, date),
            "sakinah-backup-amir-2024-03-09-encrypted.json"
        );
        assert_eq!(
            export_filename("amir", false, date),
            "sakinah-backup-amir-2024-03-09-plain.json"
        );
    }

    #[test]
    fn validation_reasons() {
        let s = service();
        assert!(matches!(
            s.validate_import_file("{not json"),
            Err(TransferError::InvalidJson(_))
        ));
        assert!(matches!(
            s.validate_import_file(r#"{"appName":"Sakinah Mood Tracker","data":""}"#),
            Err(TransferError::MissingField("version"))
        ));
        assert!(matches!(
            s.validate_import_file(r#"{"version":"1.0.0","appName":"Other","data":""}"#),
            Err(TransferError::WrongApp { .. })
        ));
        assert!(matches!(
            s.validate_import_file(r#"{"version":"1.0.0","appName":"Sakinah Mood Tracker"}"#),
            Err(TransferError::MissingField("data"))
        ));
        let text = serde_json::json!({
            "version": "1.0.0",
            "timestamp": "2024-03-09T10:00:00Z",
            "appName": "Sakinah Mood Tracker",
            "encrypted": true,
            "data": "x",
        })
        .to_string();
        let info = s.validate_import_file(&text).unwrap();
        assert_eq!(info.version, "1.0.0");
        assert!(info.encrypted);
        assert_eq!(info.timestamp.as_deref(), Some("2024-03-09T10:00:00Z"));
    }

    #[test]
    fn export_of_unknown_user_is_wrong_passphrase() {
        assert!(matches!(
            service().export_data("nobody", "correcthorse", true),
            Err(TransferError::WrongPassphrase)
        ));
    }
}
