//! Rollback: destructive truncation of version history.
//!
//! Rolling back discards every version newer than the target, so the
//! pair's current value becomes exactly the target version's value and its
//! maximum number becomes the target. The discarded rows are gone; the
//! reported count is how many were removed.

use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::store::SecretStore;
use crate::types::{EnvironmentId, RollbackOutcome, SecretId};

/// Truncates secret version histories back to a chosen version.
///
/// Together with the manager this is one of the two writers of the version
/// store.
pub struct RollbackExecutor {
    /// The transactional store of rows.
    store: Arc<SecretStore>,
}

impl RollbackExecutor {
    /// Creates an executor over the given store.
    #[must_use]
    pub fn new(store: Arc<SecretStore>) -> Self {
        Self { store }
    }

    /// Rolls a secret back to `target` and reports how many versions were
    /// discarded.
    ///
    /// With an environment given, only that (secret, environment) pair is
    /// truncated. Without one, every environment that has at least one
    /// version for this secret is truncated to the same target. The whole
    /// operation is one transaction: validation runs for every targeted
    /// pair before anything is removed, so either all pairs truncate or
    /// none do.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The secret does not exist
    /// - `target` is outside `[1, current_max]` for any targeted pair
    /// - The store stays contended past the retry budget
    pub fn rollback_secret(
        &self,
        secret: SecretId,
        environment: Option<EnvironmentId>,
        target: u32,
    ) -> Result<RollbackOutcome> {
        let outcome = self.store.write(|state| {
            if state.secret(secret).is_none() {
                return Err(Error::SecretNotFound {
                    id: secret.as_uuid(),
                });
            }

            let targets = match environment {
                Some(environment) => vec![environment],
                None => state.environments_of(secret),
            };

            for environment in &targets {
                let max = state.current_max(secret, *environment);
                if target == 0 || target > max {
                    return Err(Error::VersionOutOfRange {
                        requested: target,
                        max,
                    });
                }
            }

            let mut count = 0;
            for environment in &targets {
                count += state.truncate_after(secret, *environment, target);
            }

            Ok(RollbackOutcome { count })
        })?;

        info!(
            secret_id = %secret,
            target,
            count = outcome.count,
            "rolled back secret"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for RollbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackExecutor")
            .field("secrets", &self.store.len())
            .finish()
    }
}
