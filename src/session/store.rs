//! Session persistence.
//!
//! Three slots:
//! - **session**: the completed login, cleared on logout
//! - **pending**: material between `begin-login` and `complete-login`
//! - **salt**: one write-once salt per subject, never cleared by logout

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::record::{PendingLogin, SessionRecord};
use super::seal::{SealedEnvelope, Sealer};
use crate::crypto::Salt;
use crate::types::{Result, ZkLoginError};

const SESSION_FILE: &str = "session.json";
const PENDING_FILE: &str = "pending-login.json";
const SALTS_DIR: &str = "salts";

/// Capability interface over wherever session secrets live.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist the session record, replacing any previous one.
    async fn save(&self, record: &SessionRecord) -> Result<()>;

    /// The stored session, if one exists and has every required field.
    ///
    /// Incomplete or undecodable records are discarded.
    async fn load(&self) -> Result<Option<SessionRecord>>;

    /// Erase the session slot. Salts are untouched.
    async fn clear(&self) -> Result<()>;

    async fn save_pending(&self, pending: &PendingLogin) -> Result<()>;

    async fn load_pending(&self) -> Result<Option<PendingLogin>>;

    async fn clear_pending(&self) -> Result<()>;

    /// Record the salt for `subject`.
    ///
    /// Fails if a salt is already stored for that subject.
    async fn save_salt(&self, subject: &str, salt: &Salt) -> Result<()>;

    async fn load_salt(&self, subject: &str) -> Result<Option<Salt>>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Default)]
struct MemorySlots {
    session: Option<SessionRecord>,
    pending: Option<PendingLogin>,
    salts: HashMap<String, Salt>,
}

/// Process-local store for tests and ephemeral use.
#[derive(Default)]
pub struct MemorySessionStore {
    slots: Mutex<MemorySlots>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut MemorySlots) -> T) -> Result<T> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| ZkLoginError::Store("memory store lock poisoned".into()))?;
        Ok(f(&mut slots))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.with_slots(|s| s.session = Some(record.clone()))
    }

    async fn load(&self) -> Result<Option<SessionRecord>> {
        self.with_slots(|s| match s.session.take() {
            Some(record) if record.is_complete() => {
                s.session = Some(record.clone());
                Some(record)
            }
            Some(record) => {
                warn!(missing = ?record.missing_field(), "Discarding incomplete session");
                None
            }
            None => None,
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_slots(|s| s.session = None)
    }

    async fn save_pending(&self, pending: &PendingLogin) -> Result<()> {
        self.with_slots(|s| s.pending = Some(pending.clone()))
    }

    async fn load_pending(&self) -> Result<Option<PendingLogin>> {
        self.with_slots(|s| s.pending.clone())
    }

    async fn clear_pending(&self) -> Result<()> {
        self.with_slots(|s| s.pending = None)
    }

    async fn save_salt(&self, subject: &str, salt: &Salt) -> Result<()> {
        self.with_slots(|s| {
            if s.salts.contains_key(subject) {
                return Err(salt_exists());
            }
            s.salts.insert(subject.to_string(), salt.clone());
            Ok(())
        })?
    }

    async fn load_salt(&self, subject: &str) -> Result<Option<Salt>> {
        self.with_slots(|s| s.salts.get(subject).cloned())
    }
}

fn salt_exists() -> ZkLoginError {
    ZkLoginError::Store("salt already recorded for this subject".into())
}

// =============================================================================
// File Store
// =============================================================================

#[derive(Serialize, Deserialize)]
struct SaltRecord {
    subject: String,
    salt: Salt,
}

/// JSON files under a data directory, owner-readable only.
pub struct FileSessionStore {
    dir: PathBuf,
    sealer: Option<Sealer>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sealer: None,
        }
    }

    /// Encrypt every record with `sealer`.
    pub fn with_sealer(mut self, sealer: Sealer) -> Self {
        self.sealer = Some(sealer);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    fn salt_path(&self, subject: &str) -> PathBuf {
        self.dir
            .join(SALTS_DIR)
            .join(format!("{}.json", hex::encode(subject.as_bytes())))
    }

    /// JSON, sealed on the blocking pool when a passphrase is configured.
    async fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let plain = Zeroizing::new(serde_json::to_vec_pretty(value)?);
        match &self.sealer {
            Some(sealer) => {
                let envelope = sealer.seal_blocking(plain).await?;
                Ok(serde_json::to_vec_pretty(&envelope)?)
            }
            None => Ok(plain.to_vec()),
        }
    }

    async fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if !SealedEnvelope::is_sealed(&value) {
            return Ok(serde_json::from_value(value)?);
        }

        let sealer = self.sealer.as_ref().ok_or_else(|| {
            ZkLoginError::Config("record is sealed but no passphrase is configured".into())
        })?;
        let envelope: SealedEnvelope = serde_json::from_value(value)?;
        let plain = sealer.open_blocking(envelope).await?;
        Ok(serde_json::from_slice(&plain)?)
    }

    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ZkLoginError::Store(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Write via a temp file and rename so a crash never leaves half a record.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        write_restricted(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and decode, discarding the file if it cannot be decoded.
    async fn load_or_discard<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let Some(bytes) = self.read(path).await? else {
            return Ok(None);
        };
        match self.decode(&bytes).await {
            Ok(value) => Ok(Some(value)),
            // A wrong passphrase must not destroy the record
            Err(e @ (ZkLoginError::Crypto(_) | ZkLoginError::Config(_))) => Err(e),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable record");
                self.remove(path).await?;
                Ok(None)
            }
        }
    }
}

/// Create or truncate `path` as owner-only, then write and sync `bytes`.
///
/// Permissions are restricted before the first byte lands, including on a
/// leftover file created with looser ones.
async fn write_restricted(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    restrict_permissions(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        let bytes = self.encode(record).await?;
        self.write_atomic(&self.session_path(), &bytes).await?;
        debug!(address = %record.address, "Session saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionRecord>> {
        let path = self.session_path();
        let Some(record) = self.load_or_discard::<SessionRecord>(&path).await? else {
            return Ok(None);
        };

        if let Some(missing) = record.missing_field() {
            warn!(missing, "Discarding incomplete session");
            self.remove(&path).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn clear(&self) -> Result<()> {
        self.remove(&self.session_path()).await?;
        info!("Session cleared");
        Ok(())
    }

    async fn save_pending(&self, pending: &PendingLogin) -> Result<()> {
        let bytes = self.encode(pending).await?;
        self.write_atomic(&self.pending_path(), &bytes).await
    }

    async fn load_pending(&self) -> Result<Option<PendingLogin>> {
        self.load_or_discard(&self.pending_path()).await
    }

    async fn clear_pending(&self) -> Result<()> {
        self.remove(&self.pending_path()).await
    }

    async fn save_salt(&self, subject: &str, salt: &Salt) -> Result<()> {
        let path = self.salt_path(subject);
        if tokio::fs::try_exists(&path).await? {
            return Err(salt_exists());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = self.encode(&SaltRecord {
            subject: subject.to_string(),
            salt: salt.clone(),
        })
        .await?;

        // Fully written temp file, then a link that fails if the salt exists
        let tmp = path.with_extension("json.tmp");
        write_restricted(&tmp, &bytes).await?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        self.remove(&tmp).await?;
        match linked {
            Ok(()) => {
                info!("Salt recorded for new subject");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(salt_exists()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_salt(&self, subject: &str) -> Result<Option<Salt>> {
        let Some(bytes) = self.read(&self.salt_path(subject)).await? else {
            return Ok(None);
        };
        // Never discard a salt: losing it changes the subject's address
        let record: SaltRecord = self.decode(&bytes).await?;
        if record.subject != subject {
            return Err(ZkLoginError::Store(
                "salt record does not belong to this subject".into(),
            ));
        }
        Ok(Some(record.salt))
    }
}
