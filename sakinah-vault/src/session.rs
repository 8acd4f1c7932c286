//! Remember-me login sessions.
//!
//! A single session row (`sessions/current`) holds the passphrase encrypted
//! under a fixed, non-secret key plus the time it was created. The session
//! is valid while `now - created <= timeout` and is purged on the first read
//! after that.

use chrono::{DateTime, Duration, Utc};
use sakinah_crypto::{DerivedKey, EncryptedData};
use sakinah_storage::{Collection, Record, RecordStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::SessionResult;

pub const SESSION_ID: &str = "current";
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;
/// Longer timeouts are clamped to one year.
const MAX_SESSION_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;

const SESSION_KEY_DOMAIN: &[u8] = b"sakinah-session-key-v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active { expires_at: DateTime<Utc> },
    Expired,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    encrypted_passphrase: EncryptedData,
    timestamp: DateTime<Utc>,
}

/// Fixed obfuscation key. Not a secret; the row lives in local storage only.
fn session_key() -> DerivedKey {
    let digest = Sha256::digest(SESSION_KEY_DOMAIN);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    DerivedKey::from_bytes(bytes)
}

#[derive(Clone, Debug)]
pub struct SessionManager {
    store: RecordStore,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(store: RecordStore, timeout_secs: u64) -> Self {
        let secs = timeout_secs.min(MAX_SESSION_TIMEOUT_SECS) as i64;
        Self {
            store,
            timeout: Duration::seconds(secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn start_session(&self, passphrase: &str) -> SessionResult<()> {
        self.start_session_at(passphrase, Utc::now())
    }

    /// Replaces any existing session with one created at `now`.
    pub fn start_session_at(&self, passphrase: &str, now: DateTime<Utc>) -> SessionResult<()> {
        let stored = StoredSession {
            encrypted_passphrase: sakinah_crypto::encrypt_string(&session_key(), passphrase)?,
            timestamp: now,
        };
        let record = Record::new(SESSION_ID, serde_json::to_value(&stored)?)
            .with_sort_key(now.timestamp_millis());
        self.store.put(Collection::Sessions, &record)?;
        tracing::debug!("session started");
        Ok(())
    }

    pub fn valid_session(&self) -> SessionResult<Option<Zeroizing<String>>> {
        self.valid_session_at(Utc::now())
    }

    /// The cached passphrase if the session has not expired at `now`.
    /// Expired or unreadable sessions are deleted.
    pub fn valid_session_at(&self, now: DateTime<Utc>) -> SessionResult<Option<Zeroizing<String>>> {
        let Some(stored) = self.read()? else {
            return Ok(None);
        };
        if now - stored.timestamp > self.timeout {
            tracing::info!("session expired");
            self.clear_session()?;
            return Ok(None);
        }
        match sakinah_crypto::decrypt_string(&session_key(), &stored.encrypted_passphrase) {
            Ok(passphrase) => Ok(Some(Zeroizing::new(passphrase))),
            Err(e) => {
                tracing::warn!(error = %e, "session unreadable, discarding");
                self.clear_session()?;
                Ok(None)
            }
        }
    }

    pub fn status(&self) -> SessionResult<SessionState> {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> SessionResult<SessionState> {
        Ok(match self.read()? {
            None => SessionState::NoSession,
            Some(stored) if now - stored.timestamp > self.timeout => SessionState::Expired,
            Some(stored) => SessionState::Active {
                expires_at: stored.timestamp + self.timeout,
            },
        })
    }

    /// Logout. Deletes the session regardless of its age.
    pub fn clear_session(&self) -> SessionResult<()> {
        self.store.delete(Collection::Sessions, SESSION_ID)?;
        Ok(())
    }

    fn read(&self) -> SessionResult<Option<StoredSession>> {
        let Some(record) = self.store.get(Collection::Sessions, SESSION_ID)? else {
            return Ok(None);
        };
        match serde_json::from_value(record.data) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                tracing::warn!(error = %e, "session row malformed, discarding");
                self.clear_session()?;
                Ok(None)
            }
        }
    }
}
