//! Passphrase-protected user vault on top of the record store.
//!
//! Layout per user:
//! - `settings/<username>`: header with user info, settings and a
//!   verification envelope (a known plaintext sealed under the passphrase)
//! - `moodEntries/<id>`, `journalEntries/<id>`: one row per entry, owner =
//!   username, sort key = entry date; sensitive fields sealed individually
//! - `profiles/<username>`: the unencrypted profile used at startup
//!
//! Entry ids are unique per device, not per user. A row's owner never
//! changes: writes and deletes that name another user's id are refused,
//! and imports move colliding entries to fresh ids.
//!
//! The verification envelope is the only thing that decides whether a
//! passphrase is correct. Field decryption failures after that point are
//! treated as corruption and replaced by placeholders.

use chrono::{DateTime, Utc};
use sakinah_crypto::{CipherEnvelope, CryptoContext, CryptoError, KdfParams};
use sakinah_model::{
    EntryKind, JournalEntry, MoodEntry, Settings, UserInfo, UserProfile, VaultRecord,
};
use sakinah_storage::{Collection, Record, RecordStore, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{VaultError, VaultResult};
use crate::fields::{self, JOURNAL_FIELDS, MOOD_FIELDS};

const VERIFICATION_PLAINTEXT: &[u8] = b"verified";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultHeader {
    user: UserInfo,
    #[serde(default)]
    settings: Settings,
    last_updated: DateTime<Utc>,
    verification: CipherEnvelope,
}

impl VaultHeader {
    fn to_record(&self, username: &str) -> VaultResult<Record> {
        Ok(Record::new(username, serde_json::to_value(self)?).with_owner(username))
    }
}

/// Orchestrates sealing, verification and row storage for user vaults.
#[derive(Clone, Debug)]
pub struct SecureVault {
    store: RecordStore,
    kdf: KdfParams,
}

impl SecureVault {
    /// `kdf` is used for everything sealed from now on. Data sealed with
    /// other parameters still opens, and is upgraded on the next login.
    pub fn new(store: RecordStore, kdf: KdfParams) -> Self {
        Self { store, kdf }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    fn context(&self, passphrase: &str) -> VaultResult<CryptoContext> {
        Ok(CryptoContext::new(passphrase, self.kdf)?)
    }

    // ── Profiles ─────────────────────────────────────────────────

    /// Registers a new profile. Fails with `DuplicateUser` if one exists.
    pub fn create_profile(&self, username: &str) -> VaultResult<UserProfile> {
        let profile = UserProfile::new(username)?;
        if self.user_exists(username)? {
            return Err(VaultError::DuplicateUser(username.to_string()));
        }
        self.store.put(Collection::Profiles, &profile_row(&profile)?)?;
        tracing::info!(user = username, "profile created");
        Ok(profile)
    }

    /// Registers `username` with an empty vault under `passphrase`.
    ///
    /// Profile and header land in one transaction, so a failed signup
    /// leaves no trace of the user.
    pub fn create_user(&self, username: &str, passphrase: &str) -> VaultResult<VaultRecord> {
        let profile = UserProfile::new(username)?;
        let mut ctx = self.context(passphrase)?;
        if self.user_exists(username)? {
            return Err(VaultError::DuplicateUser(username.to_string()));
        }

        let record = VaultRecord::new(username);
        let mut batch = self.stage_record(&mut ctx, &record)?;
        batch.put(Collection::Profiles, profile_row(&profile)?);
        self.store.apply(batch)?;
        tracing::info!(user = username, "user created");
        Ok(record)
    }

    pub fn profile(&self, username: &str) -> VaultResult<Option<UserProfile>> {
        match self.store.get(Collection::Profiles, username)? {
            Some(record) => Ok(Some(serde_json::from_value(record.data)?)),
            None => Ok(None),
        }
    }

    /// All profiles, oldest first.
    pub fn profiles(&self) -> VaultResult<Vec<UserProfile>> {
        let mut profiles = Vec::new();
        for record in self.store.get_all(Collection::Profiles)? {
            match serde_json::from_value::<UserProfile>(record.data) {
                Ok(profile) => profiles.push(profile),
                Err(e) => {
                    tracing::warn!(key = %record.key, error = %e, "skipping unreadable profile")
                }
            }
        }
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(profiles)
    }

    /// The most recently created profile.
    pub fn latest_profile(&self) -> VaultResult<Option<UserProfile>> {
        Ok(self.profiles()?.pop())
    }

    pub fn user_exists(&self, username: &str) -> VaultResult<bool> {
        Ok(self.store.get(Collection::Profiles, username)?.is_some()
            || self.store.get(Collection::Settings, username)?.is_some())
    }

    // ── Unlocking ────────────────────────────────────────────────

    /// The header, if it exists and `ctx` opens its verification envelope.
    fn unlock(
        &self,
        username: &str,
        ctx: &mut CryptoContext,
    ) -> VaultResult<Option<VaultHeader>> {
        let Some(record) = self.store.get(Collection::Settings, username)? else {
            return Ok(None);
        };
        let header: VaultHeader = match serde_json::from_value(record.data) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(user = username, error = %e, "vault header unreadable");
                return Ok(None);
            }
        };
        match ctx.open(&header.verification) {
            Ok(plain) if plain == VERIFICATION_PLAINTEXT => Ok(Some(header)),
            Ok(_) => Ok(None),
            Err(CryptoError::KeyDerivation(msg)) => {
                Err(CryptoError::KeyDerivation(msg).into())
            }
            Err(_) => Ok(None),
        }
    }

    /// Unlocks or fails with `WrongPassphrase`.
    fn unlock_or_reject(
        &self,
        username: &str,
        ctx: &mut CryptoContext,
    ) -> VaultResult<VaultHeader> {
        self.unlock(username, ctx)?.ok_or(VaultError::WrongPassphrase)
    }

    /// Whether `passphrase` opens the vault of `username`.
    pub fn verify_passphrase(&self, username: &str, passphrase: &str) -> VaultResult<bool> {
        let Ok(mut ctx) = self.context(passphrase) else {
            return Ok(false);
        };
        Ok(self.unlock(username, &mut ctx)?.is_some())
    }

    fn new_header(
        &self,
        ctx: &mut CryptoContext,
        user: UserInfo,
        settings: Settings,
    ) -> VaultResult<VaultHeader> {
        Ok(VaultHeader {
            user,
            settings,
            last_updated: Utc::now(),
            verification: ctx.seal(VERIFICATION_PLAINTEXT)?,
        })
    }

    // ── Saving ───────────────────────────────────────────────────

    /// Writes the header and every entry of `record` under `passphrase`.
    ///
    /// Upserts: entries already stored but absent from `record` are left
    /// alone. If the user already has a vault, `passphrase` must open it.
    /// Entries whose id belongs to another user fail with `ForeignEntry`.
    pub fn save_user_data(&self, record: &VaultRecord, passphrase: &str) -> VaultResult<()> {
        let username = record.username();
        UserProfile::new(username)?;
        let mut ctx = self.context(passphrase)?;
        if self.store.get(Collection::Settings, username)?.is_some() {
            self.unlock_or_reject(username, &mut ctx)?;
        }
        for (collection, id) in entry_ids(record) {
            self.claim_id(collection, id, username)?;
        }

        let batch = self.stage_record(&mut ctx, record)?;
        self.store.apply(batch)?;
        tracing::debug!(
            user = username,
            moods = record.mood_entries.len(),
            journals = record.journal_entries.len(),
            "vault saved"
        );
        Ok(())
    }

    /// Like [`save_user_data`](Self::save_user_data), but replaces whatever
    /// the user had: stale rows are deleted in the same transaction and an
    /// existing header is not consulted. A missing profile is created in
    /// that transaction too. Used by import with overwrite.
    ///
    /// Entries whose id belongs to another user are stored under a fresh
    /// id. Returns the record as stored.
    pub fn replace_user_data(
        &self,
        record: &VaultRecord,
        passphrase: &str,
    ) -> VaultResult<VaultRecord> {
        let username = record.username();
        let profile = UserProfile::new(username)?;
        let mut ctx = self.context(passphrase)?;

        let mut record = record.clone();
        let moved = self.reassign_foreign_ids(&mut record)?;
        if moved > 0 {
            tracing::info!(user = username, moved, "imported entries given fresh ids");
        }
        let mut batch = self.stage_record(&mut ctx, &record)?;
        if self.profile(username)?.is_none() {
            batch.put(Collection::Profiles, profile_row(&profile)?);
        }

        let keep: Vec<(Collection, &str)> = entry_ids(&record).collect();
        for collection in [Collection::MoodEntries, Collection::JournalEntries] {
            for stale in self.store.get_all_by_owner(collection, username)? {
                if !keep.contains(&(collection, stale.key.as_str())) {
                    batch.delete(collection, stale.key);
                }
            }
        }

        self.store.apply(batch)?;
        tracing::info!(user = username, "vault replaced");
        Ok(record)
    }

    /// Whether `id` is stored under a user other than `username`.
    fn owned_by_other(
        &self,
        collection: Collection,
        id: &str,
        username: &str,
    ) -> VaultResult<bool> {
        Ok(self
            .store
            .get(collection, id)?
            .is_some_and(|row| row.owner.as_deref() != Some(username)))
    }

    /// Fails with `ForeignEntry` if `id` is stored under someone else.
    fn claim_id(&self, collection: Collection, id: &str, username: &str) -> VaultResult<()> {
        if self.owned_by_other(collection, id, username)? {
            tracing::warn!(user = username, entry = id, "refusing write to foreign entry");
            return Err(VaultError::ForeignEntry(id.to_string()));
        }
        Ok(())
    }

    /// Gives every entry whose id is taken by another user a new id.
    fn reassign_foreign_ids(&self, record: &mut VaultRecord) -> VaultResult<usize> {
        let username = record.username().to_string();
        let mut moved = 0;
        for entry in &mut record.mood_entries {
            if self.owned_by_other(Collection::MoodEntries, &entry.id, &username)? {
                entry.id = sakinah_model::new_entry_id();
                moved += 1;
            }
        }
        for entry in &mut record.journal_entries {
            if self.owned_by_other(Collection::JournalEntries, &entry.id, &username)? {
                entry.id = sakinah_model::new_entry_id();
                moved += 1;
            }
        }
        Ok(moved)
    }

    fn stage_record(
        &self,
        ctx: &mut CryptoContext,
        record: &VaultRecord,
    ) -> VaultResult<WriteBatch> {
        let username = record.username();
        let header = self.new_header(ctx, record.user.clone(), record.settings.clone())?;

        let mut batch = WriteBatch::new();
        batch.put(Collection::Settings, header.to_record(username)?);
        for entry in &record.mood_entries {
            batch.put(Collection::MoodEntries, seal_mood(ctx, username, entry)?);
        }
        for entry in &record.journal_entries {
            batch.put(Collection::JournalEntries, seal_journal(ctx, username, entry)?);
        }
        Ok(batch)
    }

    /// Saves (inserts or replaces) one mood entry of `username`.
    pub fn save_mood_entry(
        &self,
        username: &str,
        passphrase: &str,
        entry: &MoodEntry,
    ) -> VaultResult<()> {
        let mut ctx = self.context(passphrase)?;
        self.unlock_or_reject(username, &mut ctx)?;
        self.claim_id(Collection::MoodEntries, &entry.id, username)?;
        let record = seal_mood(&mut ctx, username, entry)?;
        self.store.put(Collection::MoodEntries, &record)?;
        Ok(())
    }

    /// Saves (inserts or replaces) one journal entry of `username`.
    pub fn save_journal_entry(
        &self,
        username: &str,
        passphrase: &str,
        entry: &JournalEntry,
    ) -> VaultResult<()> {
        let mut ctx = self.context(passphrase)?;
        self.unlock_or_reject(username, &mut ctx)?;
        self.claim_id(Collection::JournalEntries, &entry.id, username)?;
        let record = seal_journal(&mut ctx, username, entry)?;
        self.store.put(Collection::JournalEntries, &record)?;
        Ok(())
    }

    /// Deletes one entry of `username`. Returns whether it existed; other
    /// users' entries are never touched.
    pub fn delete_entry(&self, username: &str, kind: EntryKind, id: &str) -> VaultResult<bool> {
        let deleted = self.store.delete_owned(entry_collection(kind), id, username)?;
        tracing::debug!(user = username, ?kind, id, deleted, "delete entry");
        Ok(deleted)
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Loads and decrypts everything `username` owns.
    ///
    /// Returns `Ok(None)` for an unknown user, a wrong passphrase or an
    /// unreadable header alike. Errors are reserved for storage failures.
    pub fn load_user_data(
        &self,
        username: &str,
        passphrase: &str,
    ) -> VaultResult<Option<VaultRecord>> {
        let Ok(mut ctx) = self.context(passphrase) else {
            return Ok(None);
        };
        let Some(header) = self.unlock(username, &mut ctx)? else {
            tracing::debug!(user = username, "vault unlock rejected");
            return Ok(None);
        };

        let mood_entries =
            self.open_rows(&mut ctx, Collection::MoodEntries, username, MOOD_FIELDS)?;
        let journal_entries =
            self.open_rows(&mut ctx, Collection::JournalEntries, username, JOURNAL_FIELDS)?;
        let mut record = VaultRecord {
            user: header.user.clone(),
            mood_entries,
            journal_entries,
            settings: header.settings.clone(),
        };
        record.sort_entries();

        if header.verification.kdf != self.kdf {
            tracing::info!(user = username, "upgrading vault to current key derivation parameters");
            if let Err(e) = self.rotate(username, &mut ctx, passphrase, header) {
                tracing::warn!(
                    user = username,
                    error = %e,
                    "key derivation upgrade failed, vault left as is"
                );
            }
        }
        Ok(Some(record))
    }

    fn open_rows<T: DeserializeOwned>(
        &self,
        ctx: &mut CryptoContext,
        collection: Collection,
        username: &str,
        sensitive: &[(&str, &str)],
    ) -> VaultResult<Vec<T>> {
        let mut out = Vec::new();
        for row in self.store.get_all_by_owner(collection, username)? {
            let mut data = row.data;
            fields::open_fields(ctx, &mut data, sensitive, &row.key);
            match serde_json::from_value::<T>(data) {
                Ok(entry) => out.push(entry),
                Err(e) => {
                    tracing::warn!(entry = %row.key, error = %e, "skipping unreadable entry row")
                }
            }
        }
        Ok(out)
    }

    // ── Rotation ─────────────────────────────────────────────────

    /// Re-encrypts the whole vault of `username` under `new_passphrase`.
    ///
    /// Every row is re-sealed in memory and checked before anything is
    /// written; the swap is one transaction. On failure the vault still
    /// opens with `old_passphrase`.
    pub fn change_passphrase(
        &self,
        username: &str,
        old_passphrase: &str,
        new_passphrase: &str,
    ) -> VaultResult<()> {
        sakinah_crypto::validate_passphrase(new_passphrase)?;
        let Ok(mut old_ctx) = self.context(old_passphrase) else {
            return Err(VaultError::WrongPassphrase);
        };
        let header = self.unlock_or_reject(username, &mut old_ctx)?;
        self.rotate(username, &mut old_ctx, new_passphrase, header)?;
        tracing::info!(user = username, "passphrase changed");
        Ok(())
    }

    fn rotate(
        &self,
        username: &str,
        old_ctx: &mut CryptoContext,
        new_passphrase: &str,
        header: VaultHeader,
    ) -> VaultResult<()> {
        let mut new_ctx = self.context(new_passphrase)?;
        let mut check = self.context(new_passphrase)?;
        let mut batch = WriteBatch::new();

        for (collection, sensitive) in [
            (Collection::MoodEntries, MOOD_FIELDS),
            (Collection::JournalEntries, JOURNAL_FIELDS),
        ] {
            for mut row in self.store.get_all_by_owner(collection, username)? {
                fields::reseal_fields(
                    old_ctx,
                    &mut new_ctx,
                    &mut check,
                    &mut row.data,
                    sensitive,
                    &row.key,
                )?;
                batch.put(collection, row);
            }
        }

        let header = self.new_header(&mut new_ctx, header.user, header.settings)?;
        if check.open(&header.verification).ok().as_deref() != Some(VERIFICATION_PLAINTEXT) {
            return Err(VaultError::RotationFailed(
                "new verification envelope did not verify".into(),
            ));
        }
        batch.put(Collection::Settings, header.to_record(username)?);

        self.store.apply(batch)?;
        Ok(())
    }

    // ── Wipe ─────────────────────────────────────────────────────

    /// Deletes every profile, session, entry and header.
    pub fn wipe_all_data(&self) -> VaultResult<()> {
        self.store.clear_all()?;
        tracing::info!("all data wiped");
        Ok(())
    }
}

fn profile_row(profile: &UserProfile) -> VaultResult<Record> {
    Ok(Record::new(&profile.username, serde_json::to_value(profile)?)
        .with_owner(&profile.username)
        .with_sort_key(profile.created_at.timestamp_millis()))
}

fn entry_ids(record: &VaultRecord) -> impl Iterator<Item = (Collection, &str)> {
    let moods = record.mood_entries.iter().map(|e| (Collection::MoodEntries, e.id.as_str()));
    let journals =
        record.journal_entries.iter().map(|e| (Collection::JournalEntries, e.id.as_str()));
    moods.chain(journals)
}

pub(crate) fn entry_collection(kind: EntryKind) -> Collection {
    match kind {
        EntryKind::Mood => Collection::MoodEntries,
        EntryKind::Journal => Collection::JournalEntries,
    }
}

fn entry_row<T: Serialize>(
    ctx: &mut CryptoContext,
    username: &str,
    id: &str,
    date: DateTime<Utc>,
    entry: &T,
    sensitive: &[&str],
) -> VaultResult<Record> {
    let mut data: Value = serde_json::to_value(entry)?;
    fields::seal_fields(ctx, &mut data, sensitive)?;
    Ok(Record::new(id, data)
        .with_owner(username)
        .with_sort_key(date.timestamp_millis()))
}

fn seal_mood(ctx: &mut CryptoContext, username: &str, entry: &MoodEntry) -> VaultResult<Record> {
    entry.validate()?;
    entry_row(ctx, username, &entry.id, entry.date, entry, &["notes"])
}

fn seal_journal(
    ctx: &mut CryptoContext,
    username: &str,
    entry: &JournalEntry,
) -> VaultResult<Record> {
    entry.validate()?;
    let sensitive: &[&str] = if entry.is_private {
        &["content", "title"]
    } else {
        &["content"]
    };
    entry_row(ctx, username, &entry.id, entry.date, entry, sensitive)
}
