//! Error types for schoolbus.
//!
//! This module defines all error types used throughout the schoolbus crate,
//! together with the fixed user-facing messages shown for HTTP failures.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for schoolbus operations.
#[derive(Error, Debug)]
pub enum Error {
    // === API Errors ===
    /// The HTTP request could not be sent or the response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status code.
    #[error("API request failed with status {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the response envelope, or the status reason.
        message: String,
    },

    /// The backend answered 2xx but the envelope reported `success: false`.
    #[error("request rejected: {message}")]
    Rejected {
        /// Message from the response envelope.
        message: String,
    },

    /// The envelope was successful but carried no `data`.
    #[error("response from {path} carried no data")]
    MissingData {
        /// Request path.
        path: String,
    },

    /// A URL could not be built from the configured base URL.
    #[error("invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Session Errors ===
    /// No session is stored locally.
    #[error("not logged in")]
    NotLoggedIn,

    /// The logged-in user is not allowed to run this command.
    #[error("role '{role}' cannot {action}")]
    WrongRole {
        /// Role of the current user.
        role: String,
        /// What was attempted.
        action: &'static str,
    },

    // === Workflow Errors ===
    /// A recorder action was attempted in a state that does not allow it.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// Current state name.
        state: &'static str,
        /// Attempted action.
        action: &'static str,
    },

    /// The driver has no active bus assigned.
    #[error("driver {driver_id} has no active bus assigned")]
    NoAssignedBus {
        /// The driver's user id.
        driver_id: i64,
    },

    /// A scan source failed to start.
    #[error("failed to start scan source '{name}': {message}")]
    ScanSourceStart {
        /// Name of the scan source.
        name: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A route stop reorder referenced a position or stop that does not exist.
    #[error("invalid stop order: {message}")]
    InvalidStopOrder {
        /// Description of what went wrong.
        message: String,
    },

    /// Form input failed validation before being sent.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Field name as sent on the wire.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for schoolbus operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new API error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new validation error.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// HTTP status code carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the backend rejected the session (401).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if the backend reported a conflict (409).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Check if the backend reported a missing resource (404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if a read that failed with this error may be retried once.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The message shown to the user for this error.
    ///
    /// Well-known HTTP statuses map to fixed messages; everything else falls
    /// back to the error's display text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.status() {
            Some(401) => "Your session has expired. Please log in again.".to_string(),
            Some(403) => "You do not have permission to perform this action.".to_string(),
            Some(404) => "The requested resource was not found.".to_string(),
            Some(409) => "This record conflicts with an existing one.".to_string(),
            Some(500) => "Server error. Please try again later.".to_string(),
            _ => match self {
                Self::Api { message, .. } | Self::Rejected { message } => message.clone(),
                Self::NotLoggedIn => "You are not logged in. Run `busctl auth login`.".to_string(),
                other => other.to_string(),
            },
        }
    }
}
