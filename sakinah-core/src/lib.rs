//! Sakinah application core.
//!
//! [`Sakinah`] is the single entry point a UI talks to: signup, login,
//! remember-me resume, entry edits, backups and passphrase changes. Every
//! call runs its storage and key derivation work on tokio's blocking pool.
//!
//! ```no_run
//! # async fn demo() -> sakinah_core::AppResult<()> {
//! use sakinah_core::{Sakinah, SakinahConfig};
//!
//! sakinah_core::init_tracing();
//! let app = Sakinah::open(SakinahConfig::default())?;
//! app.signup("amir", "correcthorse", true).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;

pub use config::SakinahConfig;
pub use error::{AppError, AppResult};
pub use sakinah_storage::StorageInfo;

use sakinah_model::{EntryKind, JournalEntry, MoodEntry, VaultRecord};
use sakinah_storage::RecordStore;
use sakinah_vault::{
    export_filename, ImportExportService, SecureVault, SessionManager, SessionState,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Installs a stderr `tracing` subscriber filtered by `RUST_LOG` (default
/// `info`). Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Clone)]
struct Login {
    username: String,
    passphrase: Zeroizing<String>,
}

/// A backup ready to be written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backup {
    pub filename: String,
    pub contents: String,
}

/// Application facade.
#[derive(Clone)]
pub struct Sakinah {
    vault: SecureVault,
    sessions: SessionManager,
    transfer: ImportExportService,
    login: Arc<RwLock<Option<Login>>>,
}

impl std::fmt::Debug for Sakinah {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sakinah").field("vault", &self.vault).finish_non_exhaustive()
    }
}

/// Runs blocking store/crypto work off the async executor.
async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Task(e.to_string()))?
}

impl Sakinah {
    pub fn open(config: SakinahConfig) -> AppResult<Self> {
        config.kdf.validate().map_err(|e| AppError::Config(e.to_string()))?;
        let store = match &config.database_path {
            Some(path) => RecordStore::open(
                path,
                &config.memory_limit,
                config.threads,
                config.storage_quota_bytes,
            )?,
            None => RecordStore::open_in_memory()?.with_quota(config.storage_quota_bytes),
        };
        let vault = SecureVault::new(store.clone(), config.kdf);
        tracing::info!(
            persistent = config.database_path.is_some(),
            session_timeout_secs = config.session_timeout_secs,
            "sakinah opened"
        );
        Ok(Self {
            transfer: ImportExportService::with_app_name(vault.clone(), config.app_name.clone()),
            sessions: SessionManager::new(store, config.session_timeout_secs),
            vault,
            login: Arc::new(RwLock::new(None)),
        })
    }

    async fn current_login(&self) -> AppResult<Login> {
        self.login.read().await.clone().ok_or(AppError::NotLoggedIn)
    }

    /// Username of the logged-in user, if any.
    pub async fn current_user(&self) -> Option<String> {
        self.login.read().await.as_ref().map(|l| l.username.clone())
    }

    /// Creates a profile and an empty vault, then logs in.
    pub async fn signup(
        &self,
        username: &str,
        passphrase: &str,
        remember: bool,
    ) -> AppResult<VaultRecord> {
        sakinah_crypto::validate_passphrase(passphrase)
            .map_err(|e| AppError::InvalidPassphrase(e.to_string()))?;
        let (vault, sessions) = (self.vault.clone(), self.sessions.clone());
        let (user, pass) = (username.to_string(), Zeroizing::new(passphrase.to_string()));
        let record = blocking(move || {
            let record = vault.create_user(&user, &pass)?;
            if remember {
                sessions.start_session(&pass)?;
            }
            Ok(record)
        })
        .await?;
        self.set_login(username, passphrase).await;
        Ok(record)
    }

    /// Verifies the passphrase and logs in.
    pub async fn login(
        &self,
        username: &str,
        passphrase: &str,
        remember: bool,
    ) -> AppResult<VaultRecord> {
        let (vault, sessions) = (self.vault.clone(), self.sessions.clone());
        let (user, pass) = (username.to_string(), Zeroizing::new(passphrase.to_string()));
        let record = blocking(move || {
            let record = vault.load_user_data(&user, &pass)?.ok_or(AppError::WrongPassphrase)?;
            if remember {
                sessions.start_session(&pass)?;
            }
            Ok(record)
        })
        .await;
        match record {
            Ok(record) => {
                self.set_login(username, passphrase).await;
                tracing::info!(user = username, "logged in");
                Ok(record)
            }
            Err(e) => {
                tracing::info!(user = username, "login rejected");
                Err(e)
            }
        }
    }

    /// Logs the most recent profile back in from a still-valid session.
    pub async fn resume(&self) -> AppResult<Option<VaultRecord>> {
        let (vault, sessions) = (self.vault.clone(), self.sessions.clone());
        let resumed = blocking(move || {
            let Some(pass) = sessions.valid_session()? else {
                return Ok(None);
            };
            let Some(profile) = vault.latest_profile()? else {
                sessions.clear_session()?;
                return Ok(None);
            };
            match vault.load_user_data(&profile.username, &pass)? {
                Some(record) => Ok(Some((profile.username, pass, record))),
                None => {
                    tracing::warn!(
                        "session passphrase no longer opens the vault, discarding session"
                    );
                    sessions.clear_session()?;
                    Ok(None)
                }
            }
        })
        .await?;

        match resumed {
            Some((username, passphrase, record)) => {
                self.set_login(&username, &passphrase).await;
                tracing::info!(user = %username, "session resumed");
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub async fn logout(&self) -> AppResult<()> {
        let sessions = self.sessions.clone();
        blocking(move || Ok(sessions.clear_session()?)).await?;
        *self.login.write().await = None;
        tracing::info!("logged out");
        Ok(())
    }

    /// Remember-me state.
    pub async fn session_state(&self) -> AppResult<SessionState> {
        let sessions = self.sessions.clone();
        blocking(move || Ok(sessions.status()?)).await
    }

    /// Freshly decrypted data of the logged-in user.
    pub async fn current_data(&self) -> AppResult<VaultRecord> {
        let login = self.current_login().await?;
        let vault = self.vault.clone();
        blocking(move || {
            vault
                .load_user_data(&login.username, &login.passphrase)?
                .ok_or(AppError::WrongPassphrase)
        })
        .await
    }

    /// Saves a mood entry, assigning an id if it has none.
    pub async fn save_mood_entry(&self, mut entry: MoodEntry) -> AppResult<MoodEntry> {
        let login = self.current_login().await?;
        if entry.id.is_empty() {
            entry.id = sakinah_model::new_entry_id();
        }
        let vault = self.vault.clone();
        blocking(move || {
            vault.save_mood_entry(&login.username, &login.passphrase, &entry)?;
            Ok(entry)
        })
        .await
    }

    /// Saves a journal entry, assigning an id if it has none.
    pub async fn save_journal_entry(&self, mut entry: JournalEntry) -> AppResult<JournalEntry> {
        let login = self.current_login().await?;
        if entry.id.is_empty() {
            entry.id = sakinah_model::new_entry_id();
        }
        let vault = self.vault.clone();
        blocking(move || {
            vault.save_journal_entry(&login.username, &login.passphrase, &entry)?;
            Ok(entry)
        })
        .await
    }

    /// Deletes one of the logged-in user's entries.
    pub async fn delete_entry(&self, kind: EntryKind, id: &str) -> AppResult<bool> {
        let login = self.current_login().await?;
        let vault = self.vault.clone();
        let id = id.to_string();
        blocking(move || Ok(vault.delete_entry(&login.username, kind, &id)?)).await
    }

    /// Exports the logged-in user's vault. `passphrase` must open it and is
    /// also the bundle passphrase when `encrypt` is set.
    pub async fn export_backup(&self, passphrase: &str, encrypt: bool) -> AppResult<Backup> {
        let login = self.current_login().await?;
        let transfer = self.transfer.clone();
        let pass = Zeroizing::new(passphrase.to_string());
        blocking(move || {
            let bundle = transfer.export_data(&login.username, &pass, encrypt)?;
            Ok(Backup {
                filename: export_filename(&login.username, encrypt, bundle.timestamp.date_naive()),
                contents: bundle.to_json()?,
            })
        })
        .await
    }

    /// Imports a backup into the logged-in account. The bundle is opened
    /// with `passphrase`; the data is stored under the login passphrase.
    pub async fn import_backup(
        &self,
        text: &str,
        passphrase: &str,
        overwrite: bool,
    ) -> AppResult<VaultRecord> {
        let login = self.current_login().await?;
        let transfer = self.transfer.clone();
        let (text, pass) = (text.to_string(), Zeroizing::new(passphrase.to_string()));
        blocking(move || {
            Ok(transfer.import_data(&text, &pass, &login.username, &login.passphrase, overwrite)?)
        })
        .await
    }

    /// Re-encrypts the logged-in vault. A remembered session is moved over
    /// to the new passphrase.
    pub async fn change_passphrase(&self, old: &str, new: &str) -> AppResult<()> {
        let login = self.current_login().await?;
        let (vault, sessions) = (self.vault.clone(), self.sessions.clone());
        let username = login.username.clone();
        let old_pass = Zeroizing::new(old.to_string());
        let new_pass = Zeroizing::new(new.to_string());
        blocking(move || {
            vault.change_passphrase(&username, &old_pass, &new_pass)?;
            if matches!(sessions.status()?, SessionState::Active { .. }) {
                sessions.start_session(&new_pass)?;
            }
            Ok(())
        })
        .await?;
        self.set_login(&login.username, new).await;
        Ok(())
    }

    /// Bytes used on this device and the configured quota, if any.
    pub async fn storage_info(&self) -> AppResult<StorageInfo> {
        let store = self.vault.store().clone();
        blocking(move || Ok(store.info()?)).await
    }

    /// Deletes everything on this device and logs out.
    pub async fn wipe_all_data(&self) -> AppResult<()> {
        let vault = self.vault.clone();
        blocking(move || Ok(vault.wipe_all_data()?)).await?;
        *self.login.write().await = None;
        Ok(())
    }

    async fn set_login(&self, username: &str, passphrase: &str) {
        *self.login.write().await = Some(Login {
            username: username.to_string(),
            passphrase: Zeroizing::new(passphrase.to_string()),
        });
    }
}
