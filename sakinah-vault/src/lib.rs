//! Encrypted user vault for Sakinah.
//!
//! - [`SecureVault`]: save/load a user's data under a passphrase, per-entry
//!   updates and deletes, atomic passphrase rotation
//! - [`SessionManager`]: time-bounded remember-me login
//! - [`ImportExportService`]: portable backups, optionally encrypted
//!
//! Passphrases are only held inside a per-call crypto context. Nothing here
//! keeps key material around between calls.

mod error;
mod fields;
mod session;
mod transfer;
mod vault;

pub use error::{
    SessionError, SessionResult, TransferError, TransferResult, VaultError, VaultResult,
};
pub use fields::{FieldValue, CONTENT_PLACEHOLDER, NOTES_PLACEHOLDER, TITLE_PLACEHOLDER};
pub use session::{SessionManager, SessionState, DEFAULT_SESSION_TIMEOUT_SECS, SESSION_ID};
pub use transfer::{
    export_filename, ExportBundle, ImportExportService, ImportInfo, APP_NAME, EXPORT_VERSION,
};
pub use vault::SecureVault;
