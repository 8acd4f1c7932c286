use sakinah_storage::StorageError;
use sakinah_vault::{SessionError, TransferError, VaultError};
use thiserror::Error;

/// Errors surfaced to the UI. Each variant is something a user can be told.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("incorrect passphrase")]
    WrongPassphrase,
    #[error("could not save: storage full")]
    StorageFull,
    #[error("invalid import file: {0}")]
    MalformedImport(String),
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(String),
    #[error("invalid data: {0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("background task failed: {0}")]
    Task(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        if e.is_storage_full() {
            AppError::StorageFull
        } else {
            AppError::Storage(e.to_string())
        }
    }
}

impl From<VaultError> for AppError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::WrongPassphrase => AppError::WrongPassphrase,
            VaultError::DuplicateUser(name) => AppError::DuplicateUser(name),
            VaultError::InvalidPassphrase(msg) => AppError::InvalidPassphrase(msg),
            VaultError::Validation(v) => AppError::Validation(v.to_string()),
            foreign @ VaultError::ForeignEntry(_) => AppError::Validation(foreign.to_string()),
            VaultError::Storage(s) => s.into(),
            VaultError::Serialization(s) => AppError::Storage(s.to_string()),
            VaultError::Crypto(c) => AppError::Crypto(c.to_string()),
            VaultError::RotationFailed(msg) => AppError::Crypto(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Storage(s) => s.into(),
            SessionError::Crypto(c) => AppError::Crypto(c.to_string()),
            SessionError::Serialization(s) => AppError::Storage(s.to_string()),
        }
    }
}

impl From<TransferError> for AppError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::WrongPassphrase => AppError::WrongPassphrase,
            TransferError::DuplicateUser(name) => AppError::DuplicateUser(name),
            TransferError::Vault(v) => v.into(),
            malformed => AppError::MalformedImport(malformed.to_string()),
        }
    }
}
