//! Core types for the secret management system.
//!
//! This module defines the fundamental types used throughout the core:
//! - [`SecretId`], [`ProjectId`], [`EnvironmentId`]: identifiers
//! - [`SecretValue`]: ciphertext that zeroizes on drop
//! - [`Secret`] and [`SecretVersion`]: the stored rows
//! - Request and response types for the manager, executor, and catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Unique identifier for a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretId(Uuid);

impl SecretId {
    /// Create a new random `SecretId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SecretId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SecretId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SecretId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a project.
///
/// Projects are owned by the surrounding hierarchy; the core only
/// references them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Create a new random `ProjectId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ProjectId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an environment.
///
/// Environments are owned by the surrounding hierarchy; version rows
/// reference them but the core never creates or deletes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentId(Uuid);

impl EnvironmentId {
    /// Create a new random `EnvironmentId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EnvironmentId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EnvironmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for EnvironmentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum length for secret names.
pub const MAX_SECRET_NAME_LENGTH: usize = 256;

/// Validate a secret name.
///
/// Names are free-form display strings, unique within their project. They
/// must be non-empty after trimming and at most
/// [`MAX_SECRET_NAME_LENGTH`] characters.
///
/// # Errors
///
/// Returns an error if the name is invalid.
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidSecretName {
            reason: "name cannot be empty".to_string(),
        });
    }

    if name.len() > MAX_SECRET_NAME_LENGTH {
        return Err(Error::InvalidSecretName {
            reason: format!(
                "name too long: {} > {}",
                name.len(),
                MAX_SECRET_NAME_LENGTH
            ),
        });
    }

    Ok(())
}

/// Ciphertext of a secret value that securely zeroizes memory on drop.
///
/// The core never holds plaintext at rest; every value row stores one of
/// these.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    /// The encrypted bytes of the value.
    data: Vec<u8>,
}

impl SecretValue {
    /// Creates a new `SecretValue` from encrypted bytes.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the encrypted data as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the length of the encrypted data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the encrypted data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the `SecretValue` and returns the encrypted bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        // ManuallyDrop prevents double-zeroize; the caller takes ownership
        let mut this = std::mem::ManuallyDrop::new(self);
        std::mem::take(&mut this.data)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the bytes in debug output
        f.debug_struct("SecretValue")
            .field("len", &self.data.len())
            .field("data", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison to prevent timing attacks
        use subtle::ConstantTimeEq;
        self.data.ct_eq(&other.data).into()
    }
}

impl Eq for SecretValue {}

/// A secret row: metadata owned by a project.
///
/// The value history lives in [`SecretVersion`] rows; a secret may exist
/// with no versions at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Unique identifier.
    pub id: SecretId,
    /// The owning project.
    pub project_id: ProjectId,
    /// Display name, unique within the project.
    pub name: String,
    /// Free-text note.
    pub note: Option<String>,
    /// When the secret was created.
    pub created_at: DateTime<Utc>,
    /// When the secret metadata or history last changed.
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    /// Creates a new secret with a fresh identifier and current timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid.
    pub fn new(
        project_id: ProjectId,
        name: impl Into<String>,
        note: Option<String>,
    ) -> Result<Self> {
        let name = name.into();
        validate_secret_name(&name)?;
        let now = Utc::now();
        Ok(Self {
            id: SecretId::new(),
            project_id,
            name,
            note,
            created_at: now,
            updated_at: now,
        })
    }

    /// Records a modification by refreshing the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One historical value of a secret, scoped to a single environment.
///
/// Immutable once created except for removal by rollback or by the owning
/// secret's deletion. For a fixed (secret, environment) pair the numbers
/// are exactly `{1..=max}` in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretVersion {
    /// Unique identifier of this row.
    pub id: Uuid,
    /// The owning secret.
    pub secret_id: SecretId,
    /// The environment this value applies to.
    pub environment_id: EnvironmentId,
    /// Position in the pair's history, starting at 1.
    pub number: u32,
    /// The ciphertext value.
    pub value: SecretValue,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}

impl SecretVersion {
    /// Creates a new version row with a fresh identifier and the current
    /// timestamp.
    #[must_use]
    pub fn new(
        secret_id: SecretId,
        environment_id: EnvironmentId,
        number: u32,
        value: SecretValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            secret_id,
            environment_id,
            number,
            value,
            created_at: Utc::now(),
        }
    }
}

/// One plaintext value destined for a single environment, as supplied to
/// create or update requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    /// The environment the value applies to.
    pub environment_id: EnvironmentId,
    /// The plaintext value; encrypted before it reaches the store.
    pub value: String,
}

impl SecretEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(environment_id: EnvironmentId, value: impl Into<String>) -> Self {
        Self {
            environment_id,
            value: value.into(),
        }
    }
}

/// Request to create a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSecret {
    /// Display name, unique within the project.
    pub name: String,
    /// Free-text note.
    pub note: Option<String>,
    /// Initial values, at most one per environment. May be empty.
    pub entries: Vec<SecretEntry>,
}

impl CreateSecret {
    /// Creates a request with the given name and no note or entries.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            note: None,
            entries: Vec::new(),
        }
    }

    /// Sets the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Adds one initial value entry.
    #[must_use]
    pub fn with_entry(mut self, entry: SecretEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// Request to update a secret.
///
/// Absent fields are left unchanged. When `entries` is present it must be
/// non-empty and reference each environment at most once; each entry
/// appends one new version to that environment's history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecretUpdate {
    /// New display name, if changing.
    pub name: Option<String>,
    /// New note, if changing.
    pub note: Option<String>,
    /// New values to append, if any.
    pub entries: Option<Vec<SecretEntry>>,
}

impl SecretUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the new name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the new note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Adds one value entry to append.
    #[must_use]
    pub fn with_entry(mut self, entry: SecretEntry) -> Self {
        self.entries.get_or_insert_with(Vec::new).push(entry);
        self
    }
}

/// A secret together with version rows, as returned by creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretWithVersions {
    /// The secret row.
    pub secret: Secret,
    /// The version rows created alongside it, one per entry.
    pub versions: Vec<SecretVersion>,
}

/// Result of an update: the secret after the change plus the versions the
/// update created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedSecret {
    /// The secret row after the update.
    pub secret: Secret,
    /// The newly appended versions, one per entry processed.
    pub updated_versions: Vec<SecretVersion>,
}

/// A project listing item: a secret annotated with how many version rows
/// it has across all environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSecret {
    /// The secret row.
    pub secret: Secret,
    /// Total version rows across environments; 0 means no value has ever
    /// been written.
    pub version_count: usize,
}

/// An environment listing item: the current value of one secret.
///
/// When this deployment holds no key material for the owning project the
/// value is the base64-encoded ciphertext and `is_plaintext` is false.
/// That is a valid steady state, not a fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSecret {
    /// The secret's display name.
    pub name: String,
    /// Decrypted latest value, or base64 ciphertext when decryption is
    /// unavailable.
    pub value: String,
    /// Whether `value` is plaintext.
    pub is_plaintext: bool,
}

/// Outcome of a rollback: how many version rows were discarded across all
/// targeted (secret, environment) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    /// Number of versions removed.
    pub count: usize,
}
