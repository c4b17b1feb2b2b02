//! The version store: transactional owner of secret and version rows.
//!
//! All rows live behind a single lock so that multi-row mutations — a
//! create batch, a cascade delete, a multi-environment rollback — commit
//! atomically. The manager and the rollback executor are the only writers;
//! the catalog only reads.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::{EnvironmentId, ProjectId, Secret, SecretId, SecretValue, SecretVersion};

/// How many timed lock acquisitions a write transaction attempts before
/// surfacing [`Error::TransactionConflict`].
pub const WRITE_ATTEMPTS: u32 = 3;

/// How long each write acquisition attempt waits for the lock.
pub const WRITE_RETRY_WAIT: Duration = Duration::from_millis(50);

/// Key of a version history: one (secret, environment) pair.
type PairKey = (SecretId, EnvironmentId);

/// All rows, guarded together by the store's lock.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    /// Secret rows by ID.
    secrets: HashMap<SecretId, Secret>,
    /// Index: (project, secret name) -> secret ID.
    names: HashMap<(ProjectId, String), SecretId>,
    /// Version rows per (secret, environment), ordered by number.
    versions: HashMap<PairKey, Vec<SecretVersion>>,
}

impl StoreState {
    /// Returns the secret row, if present.
    pub(crate) fn secret(&self, id: SecretId) -> Option<&Secret> {
        self.secrets.get(&id)
    }

    /// Whether a name is already taken within a project.
    pub(crate) fn name_in_use(&self, project: ProjectId, name: &str) -> bool {
        self.names.contains_key(&(project, name.to_string()))
    }

    /// Inserts a secret row and its name-index entry.
    ///
    /// The caller checks [`Self::name_in_use`] first.
    pub(crate) fn insert_secret(&mut self, secret: Secret) {
        self.names
            .insert((secret.project_id, secret.name.clone()), secret.id);
        self.secrets.insert(secret.id, secret);
    }

    /// Renames a secret, keeping the name index in sync.
    pub(crate) fn rename_secret(&mut self, id: SecretId, name: String) {
        if let Some(secret) = self.secrets.get_mut(&id) {
            self.names.remove(&(secret.project_id, secret.name.clone()));
            self.names.insert((secret.project_id, name.clone()), id);
            secret.name = name;
        }
    }

    /// Replaces a secret's note.
    pub(crate) fn set_note(&mut self, id: SecretId, note: String) {
        if let Some(secret) = self.secrets.get_mut(&id) {
            secret.note = Some(note);
        }
    }

    /// Refreshes a secret's update timestamp.
    pub(crate) fn touch_secret(&mut self, id: SecretId) {
        if let Some(secret) = self.secrets.get_mut(&id) {
            secret.touch();
        }
    }

    /// Removes a secret and every version row it owns, across all
    /// environments. Returns the removed row and its version count.
    pub(crate) fn remove_secret(&mut self, id: SecretId) -> Option<(Secret, usize)> {
        let secret = self.secrets.remove(&id)?;
        self.names.remove(&(secret.project_id, secret.name.clone()));

        let mut removed = 0;
        self.versions.retain(|(secret_id, _), rows| {
            if *secret_id == id {
                removed += rows.len();
                false
            } else {
                true
            }
        });

        Some((secret, removed))
    }

    /// Secrets belonging to a project.
    pub(crate) fn secrets_of_project(
        &self,
        project: ProjectId,
    ) -> impl Iterator<Item = &Secret> {
        self.secrets
            .values()
            .filter(move |secret| secret.project_id == project)
    }

    /// The highest version number for a pair, or 0 when it has no history.
    pub(crate) fn current_max(&self, secret: SecretId, environment: EnvironmentId) -> u32 {
        self.versions
            .get(&(secret, environment))
            .and_then(|rows| rows.last())
            .map_or(0, |row| row.number)
    }

    /// Appends a new version to a pair's history.
    ///
    /// The number is computed from the pair's current maximum inside the
    /// same transaction that commits the row, which is what keeps numbers
    /// contiguous under concurrent mutation.
    pub(crate) fn append_version(
        &mut self,
        secret: SecretId,
        environment: EnvironmentId,
        value: SecretValue,
    ) -> SecretVersion {
        let rows = self.versions.entry((secret, environment)).or_default();
        let number = rows.last().map_or(0, |row| row.number) + 1;
        let version = SecretVersion::new(secret, environment, number, value);
        rows.push(version.clone());
        version
    }

    /// Returns one version of a pair by number.
    pub(crate) fn version(
        &self,
        secret: SecretId,
        environment: EnvironmentId,
        number: u32,
    ) -> Option<&SecretVersion> {
        self.versions
            .get(&(secret, environment))?
            .iter()
            .find(|row| row.number == number)
    }

    /// Returns the newest version of a pair.
    pub(crate) fn latest(
        &self,
        secret: SecretId,
        environment: EnvironmentId,
    ) -> Option<&SecretVersion> {
        self.versions.get(&(secret, environment))?.last()
    }

    /// Deletes every version of a pair with a number greater than `keep`.
    /// Returns how many rows were removed.
    pub(crate) fn truncate_after(
        &mut self,
        secret: SecretId,
        environment: EnvironmentId,
        keep: u32,
    ) -> usize {
        let Some(rows) = self.versions.get_mut(&(secret, environment)) else {
            return 0;
        };

        let before = rows.len();
        rows.retain(|row| row.number <= keep);
        let removed = before - rows.len();

        if rows.is_empty() {
            self.versions.remove(&(secret, environment));
        }

        removed
    }

    /// Environments that have at least one version for this secret.
    pub(crate) fn environments_of(&self, secret: SecretId) -> Vec<EnvironmentId> {
        self.versions
            .keys()
            .filter(|(secret_id, _)| *secret_id == secret)
            .map(|(_, environment)| *environment)
            .collect()
    }

    /// Total version rows for a secret across all environments.
    pub(crate) fn version_count(&self, secret: SecretId) -> usize {
        self.versions
            .iter()
            .filter(|((secret_id, _), _)| *secret_id == secret)
            .map(|(_, rows)| rows.len())
            .sum()
    }

    /// Version numbers currently present for a pair, in storage order.
    pub(crate) fn pair_numbers(
        &self,
        secret: SecretId,
        environment: EnvironmentId,
    ) -> Vec<u32> {
        self.versions
            .get(&(secret, environment))
            .map(|rows| rows.iter().map(|row| row.number).collect())
            .unwrap_or_default()
    }

    /// Number of secret rows.
    pub(crate) fn secret_count(&self) -> usize {
        self.secrets.len()
    }
}

/// The transactional store of secrets and their version histories.
///
/// Reads take the shared lock and observe only committed state. Writes run
/// as a closure under the exclusive lock, acquired with a bounded number of
/// timed attempts; a store that stays contended surfaces
/// [`Error::TransactionConflict`] instead of blocking indefinitely.
/// Writers validate before mutating, so a transaction that returns an
/// error leaves no partial state behind.
#[derive(Debug, Default)]
pub struct SecretStore {
    state: RwLock<StoreState>,
}

impl SecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Runs a read-only transaction.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.read())
    }

    /// Runs a write transaction under the exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionConflict`] when the lock cannot be
    /// acquired within the retry budget, or whatever error the transaction
    /// body returns.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        for _ in 0..WRITE_ATTEMPTS {
            if let Some(mut state) = self.state.try_write_for(WRITE_RETRY_WAIT) {
                return f(&mut state);
            }
        }

        Err(Error::TransactionConflict {
            attempts: WRITE_ATTEMPTS,
        })
    }

    /// Returns a secret row by ID.
    #[must_use]
    pub fn get_secret(&self, id: SecretId) -> Option<Secret> {
        self.read(|state| state.secret(id).cloned())
    }

    /// Whether a secret exists.
    #[must_use]
    pub fn contains_secret(&self, id: SecretId) -> bool {
        self.read(|state| state.secret(id).is_some())
    }

    /// The highest version number for a (secret, environment) pair, or 0
    /// when the pair has no history.
    #[must_use]
    pub fn current_max(&self, secret: SecretId, environment: EnvironmentId) -> u32 {
        self.read(|state| state.current_max(secret, environment))
    }

    /// One version of a pair by number.
    #[must_use]
    pub fn version(
        &self,
        secret: SecretId,
        environment: EnvironmentId,
        number: u32,
    ) -> Option<SecretVersion> {
        self.read(|state| state.version(secret, environment, number).cloned())
    }

    /// The newest version of a pair.
    #[must_use]
    pub fn latest(&self, secret: SecretId, environment: EnvironmentId) -> Option<SecretVersion> {
        self.read(|state| state.latest(secret, environment).cloned())
    }

    /// Total version rows for a secret across all environments.
    #[must_use]
    pub fn version_count(&self, secret: SecretId) -> usize {
        self.read(|state| state.version_count(secret))
    }

    /// Number of secrets in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read(StoreState::secret_count)
    }

    /// Returns true if the store holds no secrets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seed_secret(store: &SecretStore, project: ProjectId) -> SecretId {
        store
            .write(|state| {
                let secret = Secret::new(project, "seed", None)?;
                let id = secret.id;
                state.insert_secret(secret);
                Ok(id)
            })
            .expect("seed should commit")
    }

    fn append(store: &SecretStore, secret: SecretId, env: EnvironmentId, byte: u8) -> u32 {
        store
            .write(|state| {
                Ok(state
                    .append_version(secret, env, SecretValue::new(vec![byte]))
                    .number)
            })
            .expect("append should commit")
    }

    #[test]
    fn append_assigns_contiguous_numbers_from_one() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let env = EnvironmentId::new();

        assert_eq!(append(&store, secret, env, 1), 1);
        assert_eq!(append(&store, secret, env, 2), 2);
        assert_eq!(append(&store, secret, env, 3), 3);

        assert_eq!(store.current_max(secret, env), 3);
        assert_eq!(store.read(|s| s.pair_numbers(secret, env)), vec![1, 2, 3]);
    }

    #[test]
    fn environments_number_independently() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let dev = EnvironmentId::new();
        let prod = EnvironmentId::new();

        append(&store, secret, dev, 1);
        append(&store, secret, dev, 2);
        append(&store, secret, prod, 3);

        assert_eq!(store.current_max(secret, dev), 2);
        assert_eq!(store.current_max(secret, prod), 1);
        assert_eq!(store.version_count(secret), 3);
    }

    #[test]
    fn version_and_latest_lookups() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let env = EnvironmentId::new();

        append(&store, secret, env, 10);
        append(&store, secret, env, 20);

        let first = store.version(secret, env, 1).expect("version 1");
        assert_eq!(first.value.as_bytes(), &[10]);

        let latest = store.latest(secret, env).expect("latest");
        assert_eq!(latest.number, 2);
        assert_eq!(latest.value.as_bytes(), &[20]);

        assert!(store.version(secret, env, 3).is_none());
        assert!(store.latest(secret, EnvironmentId::new()).is_none());
    }

    #[test]
    fn truncate_after_removes_newer_versions() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let env = EnvironmentId::new();

        for byte in 1..=3 {
            append(&store, secret, env, byte);
        }

        let removed = store
            .write(|state| Ok(state.truncate_after(secret, env, 1)))
            .expect("truncate should commit");

        assert_eq!(removed, 2);
        assert_eq!(store.current_max(secret, env), 1);
        assert_eq!(
            store.latest(secret, env).expect("latest").value.as_bytes(),
            &[1]
        );
    }

    #[test]
    fn truncate_after_at_max_removes_nothing() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let env = EnvironmentId::new();

        append(&store, secret, env, 1);
        append(&store, secret, env, 2);

        let removed = store
            .write(|state| Ok(state.truncate_after(secret, env, 2)))
            .expect("truncate should commit");

        assert_eq!(removed, 0);
        assert_eq!(store.current_max(secret, env), 2);
    }

    #[test]
    fn truncate_after_missing_pair_removes_nothing() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());

        let removed = store
            .write(|state| Ok(state.truncate_after(secret, EnvironmentId::new(), 1)))
            .expect("truncate should commit");

        assert_eq!(removed, 0);
    }

    #[test]
    fn append_after_truncate_continues_from_new_max() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let env = EnvironmentId::new();

        for byte in 1..=3 {
            append(&store, secret, env, byte);
        }
        store
            .write(|state| Ok(state.truncate_after(secret, env, 1)))
            .expect("truncate should commit");

        assert_eq!(append(&store, secret, env, 9), 2);
        assert_eq!(store.read(|s| s.pair_numbers(secret, env)), vec![1, 2]);
    }

    #[test]
    fn remove_secret_cascades_and_frees_name() {
        let store = SecretStore::new();
        let project = ProjectId::new();
        let secret = seed_secret(&store, project);
        let dev = EnvironmentId::new();
        let prod = EnvironmentId::new();

        append(&store, secret, dev, 1);
        append(&store, secret, dev, 2);
        append(&store, secret, prod, 3);

        let (removed_secret, removed_versions) = store
            .write(|state| {
                state
                    .remove_secret(secret)
                    .ok_or(Error::SecretNotFound {
                        id: secret.as_uuid(),
                    })
            })
            .expect("remove should commit");

        assert_eq!(removed_secret.id, secret);
        assert_eq!(removed_versions, 3);
        assert!(store.is_empty());
        assert_eq!(store.version_count(secret), 0);
        assert!(!store.read(|s| s.name_in_use(project, "seed")));
    }

    #[test]
    fn name_index_tracks_renames() {
        let store = SecretStore::new();
        let project = ProjectId::new();
        let secret = seed_secret(&store, project);

        store
            .write(|state| {
                state.rename_secret(secret, "renamed".to_string());
                Ok(())
            })
            .expect("rename should commit");

        assert!(!store.read(|s| s.name_in_use(project, "seed")));
        assert!(store.read(|s| s.name_in_use(project, "renamed")));
        assert_eq!(
            store.get_secret(secret).expect("secret").name,
            "renamed"
        );
    }

    #[test]
    fn environments_of_lists_pairs_with_history() {
        let store = SecretStore::new();
        let secret = seed_secret(&store, ProjectId::new());
        let dev = EnvironmentId::new();
        let prod = EnvironmentId::new();

        append(&store, secret, dev, 1);
        append(&store, secret, prod, 2);

        let mut environments = store.read(|s| s.environments_of(secret));
        environments.sort_by_key(EnvironmentId::as_uuid);
        let mut expected = vec![dev, prod];
        expected.sort_by_key(EnvironmentId::as_uuid);

        assert_eq!(environments, expected);
    }

    #[test]
    fn write_surfaces_conflict_when_store_stays_contended() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SecretStore::new());
        let reader = Arc::clone(&store);

        let hold = thread::spawn(move || {
            reader.read(|_| {
                thread::sleep(Duration::from_millis(400));
            });
        });

        // Give the reader time to take the lock
        thread::sleep(Duration::from_millis(50));

        let result = store.write(|_| Ok(()));
        assert!(matches!(
            result,
            Err(Error::TransactionConflict { .. })
        ));

        hold.join().expect("reader thread should complete");

        // Once the lock frees up, writes succeed again
        assert!(store.write(|_| Ok(())).is_ok());
    }

    proptest! {
        #[test]
        fn prop_versions_stay_contiguous(ops in prop::collection::vec(any::<(bool, u8)>(), 1..64)) {
            let store = SecretStore::new();
            let secret = seed_secret(&store, ProjectId::new());
            let env = EnvironmentId::new();

            for (is_truncate, byte) in ops {
                if is_truncate {
                    let max = store.current_max(secret, env);
                    if max > 0 {
                        let keep = u32::from(byte) % max + 1;
                        store
                            .write(|state| Ok(state.truncate_after(secret, env, keep)))
                            .expect("truncate should commit");
                    }
                } else {
                    append(&store, secret, env, byte);
                }

                let max = store.current_max(secret, env);
                let numbers = store.read(|s| s.pair_numbers(secret, env));
                prop_assert_eq!(numbers, (1..=max).collect::<Vec<u32>>());
            }
        }
    }
}
