//! Configuration error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error type shared by providers.
///
/// Providers surface these from one-shot `load` calls; a running `watch`
/// loop treats every variant as recoverable, logs it, and keeps polling.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ConfigError {
    /// The deployment identity (project, tenant) could not be resolved
    #[error("failed to resolve deployment identity: {message}")]
    IdentityUnresolved { message: String },

    /// The underlying remote client could not be constructed
    #[error("remote client unavailable: {message}")]
    ClientUnavailable { message: String },

    /// Listing entries from a remote source failed
    #[error("failed to list secrets on {scope}: {message}")]
    ListFailed { scope: String, message: String },

    /// A single concurrent fetch failed; the whole cycle is aborted
    #[error("failed to fetch {identifier}: {message}")]
    FetchFailed { identifier: String, message: String },

    /// Configuration watch error
    #[error("configuration watch error: {message}")]
    WatchError { message: String },
}

impl ConfigError {
    /// Create an identity resolution error
    pub fn identity_unresolved(message: impl Into<String>) -> Self {
        Self::IdentityUnresolved {
            message: message.into(),
        }
    }

    /// Create a client construction error
    pub fn client_unavailable(message: impl Into<String>) -> Self {
        Self::ClientUnavailable {
            message: message.into(),
        }
    }

    /// Create a listing error
    pub fn list_failed(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ListFailed {
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error for one identifier
    pub fn fetch_failed(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Create a watch error
    pub fn watch_error(message: impl Into<String>) -> Self {
        Self::WatchError {
            message: message.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
