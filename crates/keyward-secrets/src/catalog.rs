//! Read-only projections over the store.
//!
//! The catalog never writes. Listings observe committed state under the
//! shared lock; decryption happens after the lock is released.

use std::sync::Arc;

use tracing::debug;

use crate::encryption::{Decryption, EncryptionGateway};
use crate::error::Result;
use crate::store::SecretStore;
use crate::types::{EnvironmentId, EnvironmentSecret, ProjectId, ProjectSecret, SecretValue};

/// Read-only listings of secrets.
pub struct SecretCatalog {
    /// The transactional store of rows.
    store: Arc<SecretStore>,
    /// The injectable encrypt/decrypt capability.
    gateway: Arc<dyn EncryptionGateway>,
}

impl SecretCatalog {
    /// Creates a catalog over the given store and gateway.
    #[must_use]
    pub fn new(store: Arc<SecretStore>, gateway: Arc<dyn EncryptionGateway>) -> Self {
        Self { store, gateway }
    }

    /// Every secret of a project, annotated with its total version count
    /// across environments, sorted by name.
    ///
    /// A count of 0 means no value has ever been written for the secret.
    #[must_use]
    pub fn secrets_of_project(&self, project: ProjectId) -> Vec<ProjectSecret> {
        let mut items: Vec<ProjectSecret> = self.store.read(|state| {
            state
                .secrets_of_project(project)
                .map(|secret| ProjectSecret {
                    secret: secret.clone(),
                    version_count: state.version_count(secret.id),
                })
                .collect()
        });

        items.sort_by(|a, b| a.secret.name.cmp(&b.secret.name));
        items
    }

    /// The current value of every secret of a project that has at least
    /// one version in the environment, sorted by name.
    ///
    /// Values are decrypted when this deployment holds the project's key
    /// material; otherwise the base64-encoded ciphertext is returned with
    /// `is_plaintext = false`. Missing key material never fails the
    /// listing.
    ///
    /// # Errors
    ///
    /// Returns an error only for genuine cipher failures such as tampered
    /// ciphertext.
    pub fn secrets_of_environment(
        &self,
        environment: EnvironmentId,
        project: ProjectId,
    ) -> Result<Vec<EnvironmentSecret>> {
        let mut rows: Vec<(String, SecretValue)> = self.store.read(|state| {
            state
                .secrets_of_project(project)
                .filter_map(|secret| {
                    state
                        .latest(secret.id, environment)
                        .map(|version| (secret.name.clone(), version.value.clone()))
                })
                .collect()
        });
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(
            environment_id = %environment,
            project_id = %project,
            secrets = rows.len(),
            "listing environment secrets"
        );

        rows.into_iter()
            .map(|(name, value)| self.reveal(project, name, &value))
            .collect()
    }

    /// Produces one listing item, decrypting when possible.
    fn reveal(
        &self,
        project: ProjectId,
        name: String,
        value: &SecretValue,
    ) -> Result<EnvironmentSecret> {
        use base64::Engine;

        match self.gateway.decrypt(project, value.as_bytes())? {
            Decryption::Recovered(plaintext) => Ok(EnvironmentSecret {
                name,
                value: String::from_utf8_lossy(&plaintext).into_owned(),
                is_plaintext: true,
            }),
            Decryption::Unavailable => Ok(EnvironmentSecret {
                name,
                value: base64::engine::general_purpose::STANDARD.encode(value.as_bytes()),
                is_plaintext: false,
            }),
        }
    }
}

impl std::fmt::Debug for SecretCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCatalog")
            .field("secrets", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{KeyringGateway, MasterKey};
    use crate::manager::SecretManager;
    use crate::types::{CreateSecret, SecretEntry, SecretUpdate};

    struct Fixture {
        gateway: Arc<KeyringGateway>,
        manager: SecretManager,
        catalog: SecretCatalog,
        project: ProjectId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SecretStore::new());
        let gateway = Arc::new(KeyringGateway::new(MasterKey::generate()));
        let project = ProjectId::new();
        gateway.hold_key_material(project);

        let manager = SecretManager::new(Arc::clone(&store), gateway.clone());
        let catalog = SecretCatalog::new(store, gateway.clone());
        Fixture {
            gateway,
            manager,
            catalog,
            project,
        }
    }

    #[test]
    fn project_listing_annotates_version_counts() {
        let fx = fixture();
        let dev = EnvironmentId::new();
        let prod = EnvironmentId::new();

        let populated = fx
            .manager
            .create_secret(
                fx.project,
                CreateSecret::new("DATABASE_URL")
                    .with_entry(SecretEntry::new(dev, "postgres://dev"))
                    .with_entry(SecretEntry::new(prod, "postgres://prod")),
            )
            .expect("create should succeed");
        fx.manager
            .update_secret(
                populated.secret.id,
                SecretUpdate::new().with_entry(SecretEntry::new(dev, "postgres://dev2")),
            )
            .expect("update should succeed");
        fx.manager
            .create_secret(fx.project, CreateSecret::new("API_KEY"))
            .expect("create should succeed");

        let items = fx.catalog.secrets_of_project(fx.project);

        assert_eq!(items.len(), 2);
        // Sorted by name
        assert_eq!(items[0].secret.name, "API_KEY");
        assert_eq!(items[0].version_count, 0);
        assert_eq!(items[1].secret.name, "DATABASE_URL");
        assert_eq!(items[1].version_count, 3);
    }

    #[test]
    fn project_listing_ignores_other_projects() {
        let fx = fixture();

        fx.manager
            .create_secret(fx.project, CreateSecret::new("MINE"))
            .expect("create should succeed");
        fx.manager
            .create_secret(ProjectId::new(), CreateSecret::new("THEIRS"))
            .expect("create should succeed");

        let items = fx.catalog.secrets_of_project(fx.project);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].secret.name, "MINE");
    }

    #[test]
    fn project_listing_empty_project_is_empty() {
        let fx = fixture();
        assert!(fx.catalog.secrets_of_project(ProjectId::new()).is_empty());
    }

    #[test]
    fn environment_listing_returns_decrypted_latest_value() {
        let fx = fixture();
        let env = EnvironmentId::new();

        let created = fx
            .manager
            .create_secret(
                fx.project,
                CreateSecret::new("API_KEY").with_entry(SecretEntry::new(env, "v1")),
            )
            .expect("create should succeed");
        fx.manager
            .update_secret(
                created.secret.id,
                SecretUpdate::new().with_entry(SecretEntry::new(env, "v2")),
            )
            .expect("update should succeed");

        let items = fx
            .catalog
            .secrets_of_environment(env, fx.project)
            .expect("listing should succeed");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "API_KEY");
        assert_eq!(items[0].value, "v2");
        assert!(items[0].is_plaintext);
    }

    #[test]
    fn environment_listing_skips_secrets_without_history_there() {
        let fx = fixture();
        let dev = EnvironmentId::new();
        let prod = EnvironmentId::new();

        fx.manager
            .create_secret(
                fx.project,
                CreateSecret::new("DEV_ONLY").with_entry(SecretEntry::new(dev, "v1")),
            )
            .expect("create should succeed");
        fx.manager
            .create_secret(fx.project, CreateSecret::new("NO_VALUES"))
            .expect("create should succeed");

        let items = fx
            .catalog
            .secrets_of_environment(prod, fx.project)
            .expect("listing should succeed");

        assert!(items.is_empty());
    }

    #[test]
    fn environment_listing_without_key_material_degrades_to_ciphertext() {
        use base64::Engine;

        let fx = fixture();
        let env = EnvironmentId::new();
        let unkeyed_project = ProjectId::new();

        fx.manager
            .create_secret(
                unkeyed_project,
                CreateSecret::new("API_KEY").with_entry(SecretEntry::new(env, "hunter2")),
            )
            .expect("create should succeed");

        let items = fx
            .catalog
            .secrets_of_environment(env, unkeyed_project)
            .expect("listing should succeed despite missing key material");

        assert_eq!(items.len(), 1);
        assert!(!items[0].is_plaintext);
        assert_ne!(items[0].value, "hunter2");

        // The degraded value is the base64 ciphertext, decodable as such
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&items[0].value)
            .expect("value should be valid base64");
        assert!(!decoded.is_empty());
    }

    #[test]
    fn environment_listing_regains_plaintext_when_key_material_arrives() {
        let fx = fixture();
        let env = EnvironmentId::new();
        let project = ProjectId::new();

        fx.manager
            .create_secret(
                project,
                CreateSecret::new("API_KEY").with_entry(SecretEntry::new(env, "hunter2")),
            )
            .expect("create should succeed");

        let before = fx
            .catalog
            .secrets_of_environment(env, project)
            .expect("listing should succeed");
        assert!(!before[0].is_plaintext);

        fx.gateway.hold_key_material(project);

        let after = fx
            .catalog
            .secrets_of_environment(env, project)
            .expect("listing should succeed");
        assert!(after[0].is_plaintext);
        assert_eq!(after[0].value, "hunter2");
    }

    #[test]
    fn listings_shrink_by_exactly_one_per_deletion() {
        let fx = fixture();
        let env = EnvironmentId::new();

        let first = fx
            .manager
            .create_secret(
                fx.project,
                CreateSecret::new("FIRST").with_entry(SecretEntry::new(env, "a")),
            )
            .expect("create should succeed");
        fx.manager
            .create_secret(
                fx.project,
                CreateSecret::new("SECOND").with_entry(SecretEntry::new(env, "b")),
            )
            .expect("create should succeed");

        assert_eq!(fx.catalog.secrets_of_project(fx.project).len(), 2);

        fx.manager
            .delete_secret(first.secret.id)
            .expect("delete should succeed");

        let items = fx.catalog.secrets_of_project(fx.project);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].secret.name, "SECOND");

        let env_items = fx
            .catalog
            .secrets_of_environment(env, fx.project)
            .expect("listing should succeed");
        assert_eq!(env_items.len(), 1);
        assert_eq!(env_items[0].name, "SECOND");
    }
}
