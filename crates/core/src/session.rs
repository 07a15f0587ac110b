use crate::backend::Credentials;
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::User;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{info, warn};

const SESSION_PATH: &str = "~/.ecm/session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    LoggedIn,
    /// `forced` is set when the backend rejected the token.
    LoggedOut { forced: bool },
}

/// The one place the current user and bearer token live.
///
/// Every request reads the token from here, and any request may tear the
/// session down on a 401 through [`force_logout`](Self::force_logout).
pub struct AuthSession {
    path: Option<PathBuf>,
    credentials: Mutex<Option<Credentials>>,
    status: watch::Sender<AuthStatus>,
}

impl AuthSession {
    /// Load the persisted session from the default location.
    pub fn init() -> ConsoleResult<Self> {
        Self::init_at(expand_path(SESSION_PATH)?)
    }

    /// Load the persisted session from `path`, starting logged out if nothing is stored.
    pub fn init_at(path: PathBuf) -> ConsoleResult<Self> {
        let credentials = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|e| {
                ConsoleError::Storage(format!("Failed to read session file: {}", e))
            })?;
            match serde_json::from_str::<Credentials>(&contents) {
                Ok(creds) => Some(creds),
                Err(e) => {
                    warn!("ignoring unreadable session file {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };
        Ok(Self::build(Some(path), credentials))
    }

    /// A session that is never written to disk.
    pub fn in_memory() -> Self {
        Self::build(None, None)
    }

    fn build(path: Option<PathBuf>, credentials: Option<Credentials>) -> Self {
        let initial = if credentials.is_some() {
            AuthStatus::LoggedIn
        } else {
            AuthStatus::LoggedOut { forced: false }
        };
        let (status, _) = watch::channel(initial);
        AuthSession {
            path,
            credentials: Mutex::new(credentials),
            status,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Credentials>> {
        self.credentials
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn token(&self) -> Option<String> {
        self.lock().as_ref().map(|c| c.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.lock().as_ref().map(|c| c.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn store(&self, credentials: Credentials) -> ConsoleResult<()> {
        if let Some(path) = &self.path {
            write_session(path, &credentials)?;
        }
        *self.lock() = Some(credentials);
        self.status.send_replace(AuthStatus::LoggedIn);
        Ok(())
    }

    /// Replace the stored user, keeping the token.
    pub fn update_user(&self, user: User) -> ConsoleResult<()> {
        let updated = {
            let mut guard = self.lock();
            match guard.as_mut() {
                Some(creds) => {
                    creds.user = user;
                    creds.clone()
                }
                None => return Ok(()),
            }
        };
        if let Some(path) = &self.path {
            write_session(path, &updated)?;
        }
        Ok(())
    }

    /// Explicit teardown.
    pub fn logout(&self) -> ConsoleResult<()> {
        self.lock().take();
        self.remove_file()?;
        self.status.send_replace(AuthStatus::LoggedOut { forced: false });
        Ok(())
    }

    /// Tear the session down after the backend rejected `rejected_token`.
    ///
    /// Only the first caller holding the current token performs the logout;
    /// returns whether this call did. A 401 for a token that has since been
    /// replaced leaves the new session alone.
    pub fn force_logout(&self, rejected_token: &str) -> bool {
        {
            let mut guard = self.lock();
            match guard.as_ref() {
                Some(creds) if creds.token == rejected_token => {
                    guard.take();
                }
                _ => return false,
            }
        }
        if let Err(e) = self.remove_file() {
            warn!("failed to remove session file: {}", e);
        }
        info!("session rejected by backend, logged out");
        self.status.send_replace(AuthStatus::LoggedOut { forced: true });
        true
    }

    fn remove_file(&self) -> ConsoleResult<()> {
        match &self.path {
            Some(path) if path.exists() => fs::remove_file(path).map_err(|e| {
                ConsoleError::Storage(format!("Failed to remove session file: {}", e))
            }),
            _ => Ok(()),
        }
    }
}

fn write_session(path: &Path, credentials: &Credentials) -> ConsoleResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ConsoleError::Storage(format!("Failed to create session directory: {}", e))
        })?;
    }
    let json = serde_json::to_string_pretty(credentials)
        .map_err(|e| ConsoleError::Storage(format!("Failed to serialize session: {}", e)))?;
    fs::write(path, json)
        .map_err(|e| ConsoleError::Storage(format!("Failed to write session file: {}", e)))
}

/// Expand a path that may contain `~` to the user's home directory
pub fn expand_path(path: &str) -> ConsoleResult<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ConsoleError::Config("Unable to determine home directory".to_string()))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(path))
    }
}
