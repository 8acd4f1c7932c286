//! Runtime configuration.

use sakinah_crypto::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Configuration for a [`Sakinah`](crate::Sakinah) instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SakinahConfig {
    /// DuckDB file. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,

    /// DuckDB `memory_limit` pragma.
    pub memory_limit: String,

    /// DuckDB worker threads.
    pub threads: u32,

    /// Remember-me sessions expire this many seconds after login.
    pub session_timeout_secs: u64,

    /// Key derivation for newly sealed data.
    pub kdf: KdfParams,

    /// Refuse writes once stored rows exceed this many bytes.
    pub storage_quota_bytes: Option<u64>,

    /// Written into and checked against export bundles.
    pub app_name: String,
}

impl Default for SakinahConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            memory_limit: "64MB".to_string(),
            threads: 1,
            session_timeout_secs: sakinah_vault::DEFAULT_SESSION_TIMEOUT_SECS,
            kdf: KdfParams::default(),
            storage_quota_bytes: None,
            app_name: sakinah_vault::APP_NAME.to_string(),
        }
    }
}

impl SakinahConfig {
    pub fn from_json_str(text: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| AppError::Config(e.to_string()))?;
        config.kdf.validate().map_err(|e| AppError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// In-memory store with cheap key derivation. Tests only.
    pub fn in_memory_for_tests() -> Self {
        Self {
            kdf: KdfParams::fast_for_tests(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = SakinahConfig::from_json_str(r#"{"threads": 2}"#).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.session_timeout_secs, 1800);
        assert_eq!(config.memory_limit, "64MB");
        assert_eq!(config.app_name, "Sakinah Mood Tracker");
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn kdf_can_be_configured() {
        let config = SakinahConfig::from_json_str(
            r#"{"kdf": {"alg": "pbkdf2-sha256", "iterations": 200000}}"#,
        )
        .unwrap();
        assert_eq!(config.kdf, KdfParams::Pbkdf2Sha256 { iterations: 200_000 });
    }

    #[test]
    fn absurd_kdf_is_rejected() {
        let err = SakinahConfig::from_json_str(
            r#"{"kdf": {"alg": "argon2id", "memory_kib": 0, "iterations": 1, "parallelism": 1}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sakinah.json");
        std::fs::write(&path, r#"{"session_timeout_secs": 60}"#).unwrap();
        assert_eq!(SakinahConfig::from_json_file(&path).unwrap().session_timeout_secs, 60);
        assert!(SakinahConfig::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
