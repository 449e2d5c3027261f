//! Username/password gate in front of the dashboard.
//!
//! Users come either from a static list in the config or from a JSON file of
//! the form `{"users": [{"username": "...", "password_hash": "$2b$..."}]}`.
//! Only the yes/no answer reaches the rest of the application.
use crate::error::CredentialError;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserEntry {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Static(Vec<UserEntry>),
    File(PathBuf),
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Static(Vec::new())
    }
}

#[derive(Deserialize)]
struct CredentialFile {
    users: Vec<UserEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: Vec<UserEntry>,
}

impl CredentialStore {
    pub fn new(users: Vec<UserEntry>) -> Self {
        Self { users }
    }

    pub fn from_source(source: &CredentialSource) -> Result<Self, CredentialError> {
        match source {
            CredentialSource::Static(users) => Ok(Self::new(users.clone())),
            CredentialSource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let file: CredentialFile =
                    serde_json::from_str(&text).map_err(|source| CredentialError::Parse {
                        path: path.display().to_string(),
                        source,
                    })?;
                debug!("loaded {} user(s) from {}", file.users.len(), path.display());
                Ok(Self::new(file.users))
            }
        }
    }

    /// A session may only start against a store with at least one user.
    pub fn ensure_users(&self) -> Result<(), CredentialError> {
        if self.users.is_empty() {
            Err(CredentialError::NoUsers)
        } else {
            Ok(())
        }
    }

    /// Check a login attempt, returning the stored spelling of the username.
    ///
    /// Usernames match case-insensitively after trimming.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<String, CredentialError> {
        let wanted = username.trim().to_lowercase();
        let user = self
            .users
            .iter()
            .find(|u| u.username.to_lowercase() == wanted)
            .ok_or(CredentialError::UnknownUser)?;
        if bcrypt::verify(password, &user.password_hash)? {
            info!("user {} logged in", user.username);
            Ok(user.username.clone())
        } else {
            Err(CredentialError::WrongPassword)
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.authenticate(username, password).is_ok()
    }
}
