//! Error types for the secret management core.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur in the secret management core.
#[derive(Debug, Error)]
pub enum Error {
    /// Secret not found in the store.
    #[error("secret not found: {id}")]
    SecretNotFound {
        /// The identifier of the secret that was not found.
        id: Uuid,
    },

    /// A secret with this name already exists in the project.
    #[error("secret name already exists in project: {name}")]
    DuplicateSecretName {
        /// The conflicting name.
        name: String,
    },

    /// Invalid secret name.
    #[error("invalid secret name: {reason}")]
    InvalidSecretName {
        /// The reason the name is invalid.
        reason: String,
    },

    /// Malformed entry list in a create or update request.
    #[error("invalid entries: {reason}")]
    InvalidEntries {
        /// The reason the entry list is malformed.
        reason: String,
    },

    /// Rollback target outside the valid version range for a pair.
    #[error("version {requested} outside valid range [1, {max}]")]
    VersionOutOfRange {
        /// The requested target version.
        requested: u32,
        /// The current maximum version for the pair.
        max: u32,
    },

    /// The store stayed contended past the bounded retry budget.
    ///
    /// This is the only retryable error; callers may re-issue the
    /// operation.
    #[error("transaction conflict: store still contended after {attempts} attempts")]
    TransactionConflict {
        /// How many lock acquisitions were attempted.
        attempts: u32,
    },

    /// Encryption or decryption failed.
    #[error("encryption error: {reason}")]
    EncryptionError {
        /// The reason the cipher operation failed.
        reason: String,
    },
}

/// Result type alias for secret management operations.
pub type Result<T> = std::result::Result<T, Error>;
