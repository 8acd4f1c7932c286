use serde::{Deserialize, Serialize};

use crate::entry::{JournalEntry, MoodEntry};
use crate::user::{Settings, UserInfo};

/// Everything a user owns, decrypted. This is also the plaintext payload of
/// an export bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultRecord {
    pub user: UserInfo,
    pub mood_entries: Vec<MoodEntry>,
    pub journal_entries: Vec<JournalEntry>,
    #[serde(default)]
    pub settings: Settings,
}

impl VaultRecord {
    /// An empty vault for a freshly signed-up user.
    pub fn new(username: &str) -> Self {
        Self {
            user: UserInfo::new(username),
            mood_entries: Vec::new(),
            journal_entries: Vec::new(),
            settings: Settings::default(),
        }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    /// Sorts entries by date, then id, the order the store returns them in.
    pub fn sort_entries(&mut self) {
        self.mood_entries
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        self.journal_entries
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    }
}
