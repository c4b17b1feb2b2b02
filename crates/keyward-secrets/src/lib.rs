//! # Keyward Secrets
//!
//! The versioned secret management core for Keyward:
//!
//! - **Per-environment version history**: every write to a secret's value
//!   appends a new version scoped to one environment, numbered contiguously
//!   from 1
//! - **Destructive rollback**: collapse a history back to a chosen version
//!   and learn exactly how many versions were discarded
//! - **Encrypted at rest**: values are opaque ciphertext; plaintext only
//!   exists in flight, behind an injectable encryption gateway
//! - **Degraded reads without key material**: listings for projects this
//!   deployment cannot decrypt return ciphertext with a plaintext
//!   availability flag instead of failing
//!
//! The surrounding hierarchy (workspaces, projects, environments) and all
//! authentication live outside this crate; callers pass in already
//! authorized identifiers.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use keyward_secrets::{
//!     CreateSecret, EnvironmentId, KeyringGateway, MasterKey, ProjectId,
//!     RollbackExecutor, SecretCatalog, SecretEntry, SecretManager,
//!     SecretStore, SecretUpdate,
//! };
//!
//! let store = Arc::new(SecretStore::new());
//! let gateway = Arc::new(KeyringGateway::new(MasterKey::generate()));
//! let manager = SecretManager::new(Arc::clone(&store), gateway.clone());
//! let rollback = RollbackExecutor::new(Arc::clone(&store));
//! let catalog = SecretCatalog::new(Arc::clone(&store), gateway.clone());
//!
//! let project = ProjectId::new();
//! let environment = EnvironmentId::new();
//! gateway.hold_key_material(project);
//!
//! // Create a secret with one initial value
//! let created = manager
//!     .create_secret(
//!         project,
//!         CreateSecret::new("DATABASE_URL")
//!             .with_entry(SecretEntry::new(environment, "postgres://v1")),
//!     )
//!     .unwrap();
//! assert_eq!(created.versions.len(), 1);
//!
//! // Append a second version
//! manager
//!     .update_secret(
//!         created.secret.id,
//!         SecretUpdate::new().with_entry(SecretEntry::new(environment, "postgres://v2")),
//!     )
//!     .unwrap();
//!
//! // Roll back to version 1; one version is discarded
//! let outcome = rollback
//!     .rollback_secret(created.secret.id, Some(environment), 1)
//!     .unwrap();
//! assert_eq!(outcome.count, 1);
//!
//! // The environment listing shows the restored value
//! let listing = catalog.secrets_of_environment(environment, project).unwrap();
//! assert_eq!(listing[0].value, "postgres://v1");
//! assert!(listing[0].is_plaintext);
//! ```
//!
//! ## Modules
//!
//! - [`types`]: identifiers, rows, and request/response types
//! - [`store`]: the transactional version store
//! - [`manager`]: create/update/delete orchestration
//! - [`rollback`]: destructive history truncation
//! - [`catalog`]: read-only listings
//! - [`encryption`]: the gateway boundary and the default implementation
//!
//! ## Security Considerations
//!
//! - Ciphertext values and keys use `zeroize` to clear memory on drop
//! - Constant-time comparison is used for values to prevent timing attacks
//! - Debug output for values and keys is redacted

pub mod catalog;
pub mod encryption;
pub mod error;
pub mod manager;
pub mod rollback;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{
    CreateSecret, EnvironmentId, EnvironmentSecret, ProjectId, ProjectSecret, RollbackOutcome,
    Secret, SecretEntry, SecretId, SecretUpdate, SecretValue, SecretVersion, SecretWithVersions,
    UpdatedSecret,
};

pub use encryption::{Decryption, EncryptionGateway, KeyringGateway, MasterKey};

pub use store::SecretStore;

pub use manager::SecretManager;

pub use rollback::RollbackExecutor;

pub use catalog::SecretCatalog;
