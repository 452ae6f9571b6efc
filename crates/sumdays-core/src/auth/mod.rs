//! Session token storage consumed by the sync gateway.
//!
//! Token issuance happens elsewhere; this module only persists the bearer
//! token of the signed-in user and hands it to the gateway.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{normalize_text_option, unix_timestamp_now};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<String>,
    pub token: String,
    /// Unix seconds
    pub saved_at: i64,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: Option<String>) -> AuthResult<Self> {
        let token = normalize_text_option(Some(token.into()))
            .ok_or(AuthError::InvalidToken("token must not be empty"))?;
        if token.chars().any(char::is_whitespace) {
            return Err(AuthError::InvalidToken("token must not contain whitespace"));
        }

        Ok(Self {
            user_id: normalize_text_option(user_id),
            token,
            saved_at: unix_timestamp_now(),
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .field("saved_at", &self.saved_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(&'static str),
    #[error("Failed to parse session: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Persistence for the current session
pub trait SessionStore: Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<Session>>;
    fn save_session(&self, session: &Session) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

impl<S: SessionStore> SessionStore for Arc<S> {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        self.as_ref().load_session()
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        self.as_ref().save_session(session)
    }

    fn clear_session(&self) -> AuthResult<()> {
        self.as_ref().clear_session()
    }
}

/// Process-local session store
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<Session>>>,
}

impl MemorySessionStore {
    pub fn with_token(token: impl Into<String>) -> AuthResult<Self> {
        let store = Self::default();
        store.save_session(&Session::new(token, None)?)?;
        Ok(store)
    }
}

impl SessionStore for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        let guard = self
            .session
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(guard.clone())
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.take();
        Ok(())
    }
}

/// Session persisted as a JSON file readable only by the owner
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/sumdays/session.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("sumdays").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(session)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
