use sakinah_crypto::CryptoError;
use sakinah_model::ValidationError;
use sakinah_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong passphrase, unknown user or an unreadable header. These are
    /// deliberately indistinguishable.
    #[error("incorrect passphrase")]
    WrongPassphrase,
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(String),
    #[error("invalid data: {0}")]
    Validation(#[from] ValidationError),
    /// The entry id is already taken by another profile on this device.
    #[error("entry {0} belongs to another user")]
    ForeignEntry(String),
    /// A staged re-encryption did not verify; nothing was written.
    #[error("passphrase rotation aborted: {0}")]
    RotationFailed(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("crypto error: {0}")]
    Crypto(CryptoError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidPassphrase(msg) => VaultError::InvalidPassphrase(msg),
            other => VaultError::Crypto(other),
        }
    }
}

impl VaultError {
    pub fn is_storage_full(&self) -> bool {
        matches!(self, VaultError::Storage(e) if e.is_storage_full())
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Import/export failures, one variant per user-facing reason.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid JSON format")]
    InvalidJson(String),
    #[error("missing field in export file: {0}")]
    MissingField(&'static str),
    #[error("export file is not from {expected} (found {found:?})")]
    WrongApp { expected: String, found: String },
    #[error("failed to decrypt import data, check your passphrase")]
    DecryptionFailed,
    #[error("invalid user data structure in import file: {0}")]
    InvalidUserData(String),
    #[error("user already exists: {0}, enable overwrite to replace existing data")]
    DuplicateUser(String),
    #[error("unable to load user data, check your passphrase")]
    WrongPassphrase,
    #[error(transparent)]
    Vault(VaultError),
}

impl From<VaultError> for TransferError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::WrongPassphrase => TransferError::WrongPassphrase,
            VaultError::DuplicateUser(name) => TransferError::DuplicateUser(name),
            other => TransferError::Vault(other),
        }
    }
}

impl From<StorageError> for TransferError {
    fn from(e: StorageError) -> Self {
        TransferError::Vault(VaultError::Storage(e))
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
