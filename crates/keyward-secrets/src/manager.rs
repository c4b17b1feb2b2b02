//! Secret lifecycle orchestration: create, update, delete.
//!
//! The manager owns secret metadata and delegates value history to the
//! store. Plaintext is encrypted through the gateway before a write
//! transaction opens, so the lock is never held across cipher work; the
//! transaction re-validates existence and name uniqueness before mutating.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::encryption::EncryptionGateway;
use crate::error::{Error, Result};
use crate::store::SecretStore;
use crate::types::{
    CreateSecret, EnvironmentId, ProjectId, Secret, SecretEntry, SecretId, SecretUpdate,
    SecretValue, SecretVersion, SecretWithVersions, UpdatedSecret, validate_secret_name,
};

/// Creates, updates, and deletes secrets and their version histories.
///
/// Together with the rollback executor this is one of the two writers of
/// the version store. Every multi-row mutation commits in one transaction:
/// a failed operation leaves no partial state.
pub struct SecretManager {
    /// The transactional store of rows.
    store: Arc<SecretStore>,
    /// The injectable encrypt/decrypt capability.
    gateway: Arc<dyn EncryptionGateway>,
}

impl SecretManager {
    /// Creates a manager over the given store and gateway.
    #[must_use]
    pub fn new(store: Arc<SecretStore>, gateway: Arc<dyn EncryptionGateway>) -> Self {
        Self { store, gateway }
    }

    /// Creates a secret with one version (number 1) per entry.
    ///
    /// The entry list may be empty; the secret then exists with no value
    /// history until the first update.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is invalid or already taken within the project
    /// - The entry list references an environment more than once
    /// - Encryption fails
    pub fn create_secret(
        &self,
        project: ProjectId,
        request: CreateSecret,
    ) -> Result<SecretWithVersions> {
        reject_duplicate_environments(&request.entries)?;

        let secret = Secret::new(project, request.name, request.note)?;
        let sealed = self.seal_entries(project, &request.entries)?;

        let created = self.store.write(|state| {
            if state.name_in_use(project, &secret.name) {
                return Err(Error::DuplicateSecretName {
                    name: secret.name.clone(),
                });
            }

            state.insert_secret(secret.clone());
            let versions = sealed
                .into_iter()
                .map(|(environment, value)| state.append_version(secret.id, environment, value))
                .collect();

            Ok(SecretWithVersions {
                secret: secret.clone(),
                versions,
            })
        })?;

        info!(
            secret_id = %created.secret.id,
            project_id = %project,
            versions = created.versions.len(),
            "created secret"
        );
        Ok(created)
    }

    /// Updates a secret's metadata and appends one new version per entry.
    ///
    /// Metadata fields are overwritten in place when present. Each entry
    /// appends to its environment's history with number = current max + 1
    /// (1 for an environment with no prior versions).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The secret does not exist
    /// - The new name is invalid or taken by another secret in the project
    /// - The entry list is present but empty, or references an environment
    ///   more than once
    /// - Encryption fails
    pub fn update_secret(&self, id: SecretId, update: SecretUpdate) -> Result<UpdatedSecret> {
        if let Some(entries) = &update.entries {
            if entries.is_empty() {
                return Err(Error::InvalidEntries {
                    reason: "entry list is present but empty".to_string(),
                });
            }
            reject_duplicate_environments(entries)?;
        }

        if let Some(name) = &update.name {
            validate_secret_name(name)?;
        }

        let project = self
            .store
            .get_secret(id)
            .ok_or(Error::SecretNotFound { id: id.as_uuid() })?
            .project_id;

        let sealed = match &update.entries {
            Some(entries) => self.seal_entries(project, entries)?,
            None => Vec::new(),
        };

        let updated = self.store.write(|state| {
            let current_name = match state.secret(id) {
                Some(secret) => secret.name.clone(),
                None => return Err(Error::SecretNotFound { id: id.as_uuid() }),
            };

            if let Some(name) = &update.name {
                if *name != current_name && state.name_in_use(project, name) {
                    return Err(Error::DuplicateSecretName { name: name.clone() });
                }
            }

            if let Some(name) = update.name {
                state.rename_secret(id, name);
            }
            if let Some(note) = update.note {
                state.set_note(id, note);
            }

            let updated_versions: Vec<SecretVersion> = sealed
                .into_iter()
                .map(|(environment, value)| state.append_version(id, environment, value))
                .collect();
            state.touch_secret(id);

            let secret = state
                .secret(id)
                .cloned()
                .ok_or(Error::SecretNotFound { id: id.as_uuid() })?;

            Ok(UpdatedSecret {
                secret,
                updated_versions,
            })
        })?;

        info!(
            secret_id = %id,
            versions_added = updated.updated_versions.len(),
            "updated secret"
        );
        Ok(updated)
    }

    /// Deletes a secret and all of its version rows across all
    /// environments in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret does not exist.
    pub fn delete_secret(&self, id: SecretId) -> Result<()> {
        let (secret, versions_removed) = self.store.write(|state| {
            state
                .remove_secret(id)
                .ok_or(Error::SecretNotFound { id: id.as_uuid() })
        })?;

        info!(
            secret_id = %id,
            project_id = %secret.project_id,
            versions_removed,
            "deleted secret"
        );
        Ok(())
    }

    /// Encrypts every entry's value for the project.
    fn seal_entries(
        &self,
        project: ProjectId,
        entries: &[SecretEntry],
    ) -> Result<Vec<(EnvironmentId, SecretValue)>> {
        entries
            .iter()
            .map(|entry| {
                let ciphertext = self.gateway.encrypt(project, entry.value.as_bytes())?;
                Ok((entry.environment_id, SecretValue::new(ciphertext)))
            })
            .collect()
    }
}

impl std::fmt::Debug for SecretManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretManager")
            .field("secrets", &self.store.len())
            .finish()
    }
}

/// Rejects an entry list that references any environment more than once.
fn reject_duplicate_environments(entries: &[SecretEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.environment_id) {
            return Err(Error::InvalidEntries {
                reason: format!(
                    "environment referenced more than once: {}",
                    entry.environment_id
                ),
            });
        }
    }
    Ok(())
}
