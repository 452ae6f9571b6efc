//! Session token persistence in the OS keychain.

use std::path::Path;

use sumdays_core::auth::{AuthError, AuthResult, Session, SessionStore};

/// Where raw session secrets live, keyed by account name
trait SecretBackend {
    fn read(account: &str) -> AuthResult<Option<String>>;
    fn write(account: &str, secret: &str) -> AuthResult<()>;
    fn erase(account: &str) -> AuthResult<()>;
}

fn storage_error(error: impl std::fmt::Display) -> AuthError {
    AuthError::SecureStorage(error.to_string())
}

#[cfg(not(test))]
type Backend = keychain::OsKeychain;
#[cfg(test)]
type Backend = memory::ProcessMemory;

#[cfg(not(test))]
mod keychain {
    use keyring::{Entry, Error};

    use super::{storage_error, AuthResult, SecretBackend};

    const SERVICE: &str = "sumdays-cli";

    pub struct OsKeychain;

    fn entry(account: &str) -> AuthResult<Entry> {
        Entry::new(SERVICE, account).map_err(storage_error)
    }

    impl SecretBackend for OsKeychain {
        fn read(account: &str) -> AuthResult<Option<String>> {
            match entry(account)?.get_password() {
                Ok(secret) => Ok(Some(secret)),
                Err(Error::NoEntry) => Ok(None),
                Err(error) => Err(storage_error(error)),
            }
        }

        fn write(account: &str, secret: &str) -> AuthResult<()> {
            entry(account)?.set_password(secret).map_err(storage_error)
        }

        fn erase(account: &str) -> AuthResult<()> {
            match entry(account)?.delete_credential() {
                Ok(()) | Err(Error::NoEntry) => Ok(()),
                Err(error) => Err(storage_error(error)),
            }
        }
    }
}


/// Session of one journal database, serialized as JSON into one keychain item
#[derive(Clone)]
pub struct KeychainSessionStore {
    account: String,
}

impl KeychainSessionStore {
    /// Separate journals keep separate sessions
    pub fn for_database(db_path: &Path) -> Self {
        Self {
            account: format!("session:{}", db_path.display()),
        }
    }
}

impl SessionStore for KeychainSessionStore {
    fn load_session(&self) -> AuthResult<Option<Session>> {
        Backend::read(&self.account)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(AuthError::from)
    }

    fn save_session(&self, session: &Session) -> AuthResult<()> {
        Backend::write(&self.account, &serde_json::to_string(session)?)
    }

    fn clear_session(&self) -> AuthResult<()> {
        Backend::erase(&self.account)
    }
}
