//! The authenticated session, injected into every client that needs a token.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::models::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
}

/// Holds at most one session. Reads go through [`SessionStore::current`];
/// writes go through [`SessionStore::establish`] and [`SessionStore::logout`].
/// When backed by a file, memory and file change together under the same lock.
#[derive(Debug)]
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(None),
            path: None,
        }
    }

    /// Opens a file-backed store. A missing file means logged out; a corrupt
    /// one is logged and treated the same way.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match read_session(&path) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "discarding unreadable session file");
                None
            }
        };
        Self {
            current: RwLock::new(current),
            path: Some(path),
        }
    }

    pub fn current(&self) -> Option<Session> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn token(&self) -> Result<String> {
        self.current()
            .map(|session| session.token)
            .ok_or(ApiError::Unauthenticated)
    }

    pub fn establish(&self, session: Session) -> Result<()> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(path) = &self.path {
            write_session(path, &session)?;
        }
        tracing::info!(role = %session.role, "session established");
        *guard = Some(session);
        Ok(())
    }

    /// Clears the session. Returns whether one was active.
    pub fn logout(&self) -> Result<bool> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(ApiError::Config(format!(
                        "failed to remove session file {}: {err}",
                        path.display()
                    )))
                }
            }
        }
        Ok(guard.take().is_some())
    }
}

fn read_session(path: &Path) -> std::result::Result<Option<Session>, String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.to_string()),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|err| err.to_string())
}

fn write_session(path: &Path, session: &Session) -> Result<()> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(session).map_err(std::io::Error::other)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        // The mode above only applies to new files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(body.as_bytes())
    };
    write().map_err(|err| {
        ApiError::Config(format!(
            "failed to write session file {}: {err}",
            path.display()
        ))
    })
}
