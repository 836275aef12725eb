//! Service layer error types.

use store::StoreError;
use thiserror::Error;

use crate::services::email::EmailError;
use crate::services::security::PasswordHashError;

/// Errors raised by a repository inside a unit of work.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An aggregate with this key is already tracked in the current scope.
    #[error("Duplicate {aggregate_type} in unit of work: {key}")]
    DuplicateKey {
        aggregate_type: &'static str,
        key: String,
    },

    /// The aggregate was removed earlier in the current scope.
    #[error("{aggregate_type} {key} was removed in this unit of work")]
    Removed {
        aggregate_type: &'static str,
        key: String,
    },

    /// Merging a changeset did not yield a complete aggregate.
    #[error("Incomplete {aggregate_type} record {key}: {source}")]
    IncompleteRecord {
        aggregate_type: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Record store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by command and event handlers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("The requested record does not exist")]
    DoesNotExist,

    #[error("A record with this key already exists")]
    AlreadyExists,

    #[error("Inactive user")]
    InactiveUser,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("New password cannot be the same as the current one")]
    SamePassword,

    /// The password does not satisfy the length policy.
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// Hashing a new password failed.
    #[error("{0}")]
    PasswordHash(#[from] PasswordHashError),

    /// Email delivery failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Repository error.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Record store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for handler results.
pub type Result<T> = std::result::Result<T, ServiceError>;
