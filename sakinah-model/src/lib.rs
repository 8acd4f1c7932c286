//! Domain types shared by the Sakinah storage core.
//!
//! These are the decrypted, in-memory shapes. How fields are sealed at rest
//! is decided by the vault crate, not here.

mod entry;
mod error;
mod record;
mod user;

pub use entry::{EntryKind, IslamicPractices, JournalEntry, MoodEntry, MoodLevel};
pub use error::{ValidationError, ValidationResult};
pub use record::VaultRecord;
pub use user::{Language, Settings, Theme, UserInfo, UserProfile};

/// Generates a new entry id. UUIDv7 keeps ids unique under rapid successive
/// writes while still sorting by creation time.
pub fn new_entry_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
