//! Explicit login session.
//!
//! A [`Session`] is loaded once at startup from its [`SessionStore`], handed
//! to the API client, and removed again on logout or when the backend
//! answers 401. Nothing else keeps auth state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Role, Student, User};

/// Who the session belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// An administrator or driver account.
    Staff {
        /// The account returned by the backend.
        user: User,
    },
    /// A parent authenticated with their child's QR code.
    Guardian {
        /// The child the QR code belongs to.
        student: Student,
    },
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token mirrored from the login response.
    pub token: String,
    /// Authenticated principal.
    pub principal: Principal,
    /// When the login happened.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a staff session.
    #[must_use]
    pub fn staff(token: impl Into<String>, user: User) -> Self {
        Self {
            token: token.into(),
            principal: Principal::Staff { user },
            created_at: Utc::now(),
        }
    }

    /// Create a guardian session.
    #[must_use]
    pub fn guardian(token: impl Into<String>, student: Student) -> Self {
        Self {
            token: token.into(),
            principal: Principal::Guardian { student },
            created_at: Utc::now(),
        }
    }

    /// The staff account, if this is a staff session.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match &self.principal {
            Principal::Staff { user } => Some(user),
            Principal::Guardian { .. } => None,
        }
    }

    /// The child, if this is a guardian session.
    #[must_use]
    pub fn student(&self) -> Option<&Student> {
        match &self.principal {
            Principal::Guardian { student } => Some(student),
            Principal::Staff { .. } => None,
        }
    }

    /// Role of the session.
    #[must_use]
    pub fn role(&self) -> Role {
        match &self.principal {
            Principal::Staff { user } => user.role,
            Principal::Guardian { .. } => Role::Parent,
        }
    }

    /// Ensure the session has `role`, returning the staff account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongRole`] for any other role.
    pub fn require_staff(&self, role: Role, action: &'static str) -> Result<&User> {
        match self.user() {
            Some(user) if user.role == role => Ok(user),
            _ => Err(Error::WrongRole {
                role: self.role().to_string(),
                action,
            }),
        }
    }

    /// Short description for status output.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.principal {
            Principal::Staff { user } => {
                format!("{} <{}> ({})", user.full_name(), user.email, user.role)
            }
            Principal::Guardian { student } => {
                format!("guardian of {} ({})", student.full_name(), student.qr_code)
            }
        }
    }
}

/// File-backed storage for the current session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store the session at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session.
    ///
    /// A missing file means no session. A file that no longer parses is
    /// discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<Session>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Discarding unreadable session file"
                );
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Load the stored session, failing if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoggedIn`] when no session is stored.
    pub fn require(&self) -> Result<Session> {
        self.load()?.ok_or(Error::NotLoggedIn)
    }

    /// Persist `session`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;

        info!("Session saved for {}", session.describe());
        Ok(())
    }

    /// Remove the stored session. Removing a missing session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
