use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use directories::BaseDirs;

use super::{ObjectId, UserSummary};
use crate::errors::ApiError;

pub const USER_KEY: &str = "user";
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

// Transient entries that only survive a restart mid-flow.
pub const VERIFICATION_EMAIL_KEY: &str = "verification_email";
pub const RESET_EMAIL_KEY: &str = "reset_email";
pub const LAST_VIEWED_CONTRIBUTION_KEY: &str = "last_viewed_contribution";

const SESSION_KEYS: [&str; 3] = [USER_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY];

/// The authenticated user and both bearer tokens.
/// Either all of it is stored or none of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserSummary,
    pub access_token: String,
    pub refresh_token: String,
}

/// Client-local persistent string storage.
///
/// Writes are batched so a session is stored or removed as one unit.
pub trait Storage: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;
    fn set_all(&self, entries: &[(&str, String)]) -> Result<(), ApiError>;
    fn remove_all(&self, keys: &[&str]) -> Result<(), ApiError>;
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, String)]) -> Result<(), ApiError> {
        let mut stored = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            stored.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), ApiError> {
        let mut stored = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            stored.remove(*key);
        }
        Ok(())
    }
}

/// Default location of the persisted state.
pub fn default_session_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("edusphere").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("./session.json"))
}

/// Storage kept in a single JSON object file.
///
/// Every write replaces the file through a rename, so readers see either the
/// old or the new state. Two processes sharing a file are last-write-wins.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, ApiError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).or(Err(ApiError::SessionCorrupted))
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), ApiError> {
        if entries.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_vec_pretty(entries).or(Err(ApiError::SessionCorrupted))?;
        let staging = self.path.with_extension("json.tmp");
        // A leftover staging file would keep its old mode
        if staging.exists() {
            fs::remove_file(&staging)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&staging)?;
        file.write_all(&contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set_all(&self, entries: &[(&str, String)]) -> Result<(), ApiError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupted file is replaced rather than blocking new writes
        let mut stored = self.load().unwrap_or_default();
        for (key, value) in entries {
            stored.insert(key.to_string(), value.clone());
        }
        self.store(&stored)
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), ApiError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stored = self.load().unwrap_or_default();
        for key in keys {
            stored.remove(*key);
        }
        self.store(&stored)
    }
}

/// Read/write access to the persisted session, shared by everything that
/// needs to know who is logged in.
#[derive(Debug, Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// True iff a user record is stored.
    pub fn is_logged_in(&self) -> bool {
        matches!(self.storage.get(USER_KEY), Ok(Some(_)))
    }

    pub fn current_user(&self) -> Option<UserSummary> {
        let raw = self.storage.get(USER_KEY).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN_KEY).ok().flatten()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY).ok().flatten()
    }

    /// The whole session, or `None` if any part is missing.
    pub fn current_session(&self) -> Option<Session> {
        Some(Session {
            user: self.current_user()?,
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
        })
    }

    /// Replaces any stored session with `session`.
    pub fn persist(&self, session: &Session) -> Result<(), ApiError> {
        let user = serde_json::to_string(&session.user).or(Err(ApiError::SessionCorrupted))?;
        self.storage.set_all(&[
            (USER_KEY, user),
            (ACCESS_TOKEN_KEY, session.access_token.clone()),
            (REFRESH_TOKEN_KEY, session.refresh_token.clone()),
        ])
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        self.storage.remove_all(&SESSION_KEYS)
    }

    pub fn set_pending_verification(&self, email: &str) -> Result<(), ApiError> {
        self.storage
            .set_all(&[(VERIFICATION_EMAIL_KEY, email.to_string())])
    }

    pub fn pending_verification(&self) -> Option<String> {
        self.storage.get(VERIFICATION_EMAIL_KEY).ok().flatten()
    }

    pub fn clear_pending_verification(&self) -> Result<(), ApiError> {
        self.storage.remove_all(&[VERIFICATION_EMAIL_KEY])
    }

    pub fn set_pending_reset(&self, email: &str) -> Result<(), ApiError> {
        self.storage.set_all(&[(RESET_EMAIL_KEY, email.to_string())])
    }

    pub fn pending_reset(&self) -> Option<String> {
        self.storage.get(RESET_EMAIL_KEY).ok().flatten()
    }

    pub fn clear_pending_reset(&self) -> Result<(), ApiError> {
        self.storage.remove_all(&[RESET_EMAIL_KEY])
    }

    pub fn remember_contribution(&self, id: &ObjectId) -> Result<(), ApiError> {
        self.storage
            .set_all(&[(LAST_VIEWED_CONTRIBUTION_KEY, id.to_string())])
    }

    pub fn last_viewed_contribution(&self) -> Option<ObjectId> {
        self.storage
            .get(LAST_VIEWED_CONTRIBUTION_KEY)
            .ok()
            .flatten()
            .map(ObjectId::from)
    }
}
