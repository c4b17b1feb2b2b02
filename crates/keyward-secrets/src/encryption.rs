//! Cryptographic operations and the encryption gateway boundary.
//!
//! The core never mandates a cipher; it consumes the [`EncryptionGateway`]
//! trait and treats values as opaque ciphertext. This module also ships the
//! default gateway, [`KeyringGateway`], which uses ChaCha20-Poly1305 AEAD
//! with per-project keys derived from a master key:
//! - Master key generation
//! - Project-specific key derivation
//! - Authenticated encryption with random nonces
//! - A per-project record of whether local key material is held, which is
//!   what the read path's plaintext-availability flag reports

use std::collections::HashSet;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use parking_lot::RwLock;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::types::ProjectId;

/// Size of the encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// Outcome of a decryption attempt.
///
/// Unavailability is data, not an error: a project operating without local
/// key material is a valid steady state, and listings degrade to ciphertext
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    /// Plaintext recovered with locally held key material.
    Recovered(Vec<u8>),
    /// This deployment holds no key material for the owning project.
    Unavailable,
}

impl Decryption {
    /// Returns the plaintext, if it was recovered.
    #[must_use]
    pub fn into_plaintext(self) -> Option<Vec<u8>> {
        match self {
            Self::Recovered(bytes) => Some(bytes),
            Self::Unavailable => None,
        }
    }
}

/// The injectable encrypt/decrypt capability consumed by the core.
///
/// Implementations own all key management. `encrypt` must always succeed
/// for an authorized project; `decrypt` reports
/// [`Decryption::Unavailable`] when the deployment lacks the project's key
/// material and reserves errors for genuine cipher failures such as
/// tampered ciphertext.
pub trait EncryptionGateway: Send + Sync {
    /// Encrypts a plaintext value for the given project.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    fn encrypt(&self, project: ProjectId, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Attempts to decrypt a ciphertext for the given project.
    ///
    /// # Errors
    ///
    /// Returns an error only for cipher failures; missing key material is
    /// reported as [`Decryption::Unavailable`].
    fn decrypt(&self, project: ProjectId, ciphertext: &[u8]) -> Result<Decryption>;
}

/// A master key from which per-project keys are derived.
///
/// The key is securely zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Generates a new random master key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a `MasterKey` from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::EncryptionError {
                reason: format!("key must be exactly {KEY_SIZE} bytes, got {}", bytes.len()),
            });
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a project-specific key from this master key.
    ///
    /// Uses BLAKE3 key derivation so every project encrypts under a unique
    /// key.
    #[must_use]
    pub fn derive_for_project(&self, project: ProjectId) -> Self {
        let context = format!("keyward-secrets v1 project {project}");
        let derived = blake3::derive_key(&context, &self.bytes);
        Self { bytes: derived }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts plaintext using ChaCha20-Poly1305.
///
/// The output format is: `nonce || ciphertext || tag`
///
/// # Errors
///
/// Returns an error if encryption fails.
pub fn encrypt(key: &MasterKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(&key.bytes).map_err(|e| Error::EncryptionError {
        reason: format!("failed to create cipher: {e}"),
    })?;

    // Random nonce per value
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::EncryptionError {
            reason: format!("encryption failed: {e}"),
        })?;

    // Prepend nonce to ciphertext
    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

/// Decrypts ciphertext that was encrypted with [`encrypt`].
///
/// Expects the input format: `nonce || ciphertext || tag`
///
/// # Errors
///
/// Returns an error if:
/// - The ciphertext is too short
/// - Authentication fails (wrong key or tampered data)
pub fn decrypt(key: &MasterKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::EncryptionError {
            reason: format!(
                "ciphertext too short: expected at least {} bytes, got {}",
                NONCE_SIZE + TAG_SIZE,
                ciphertext.len()
            ),
        });
    }

    let cipher = ChaCha20Poly1305::new_from_slice(&key.bytes).map_err(|e| Error::EncryptionError {
        reason: format!("failed to create cipher: {e}"),
    })?;

    let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
    let encrypted = &ciphertext[NONCE_SIZE..];

    cipher
        .decrypt(nonce, encrypted)
        .map_err(|e| Error::EncryptionError {
            reason: format!("decryption failed: {e}"),
        })
}

/// Default encryption gateway keyed by a master key.
///
/// Every project encrypts under its own derived key. Decryption is only
/// offered for projects whose key material this deployment holds; for all
/// others [`Decryption::Unavailable`] is returned, which the read path
/// surfaces as `is_plaintext = false`.
pub struct KeyringGateway {
    /// The master key used for derivation.
    master: MasterKey,
    /// Projects whose key material is held locally.
    keyed_projects: RwLock<HashSet<ProjectId>>,
}

impl KeyringGateway {
    /// Creates a gateway with the given master key and no keyed projects.
    #[must_use]
    pub fn new(master: MasterKey) -> Self {
        Self {
            master,
            keyed_projects: RwLock::new(HashSet::new()),
        }
    }

    /// Records that this deployment holds key material for a project,
    /// enabling decryption of its values.
    pub fn hold_key_material(&self, project: ProjectId) {
        self.keyed_projects.write().insert(project);
    }

    /// Discards the record of key material for a project. Subsequent
    /// decryption attempts report [`Decryption::Unavailable`].
    pub fn drop_key_material(&self, project: ProjectId) {
        self.keyed_projects.write().remove(&project);
    }

    /// Whether this deployment can decrypt values of the given project.
    #[must_use]
    pub fn holds_key_material(&self, project: ProjectId) -> bool {
        self.keyed_projects.read().contains(&project)
    }
}

impl EncryptionGateway for KeyringGateway {
    fn encrypt(&self, project: ProjectId, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self.master.derive_for_project(project);
        encrypt(&key, plaintext)
    }

    fn decrypt(&self, project: ProjectId, ciphertext: &[u8]) -> Result<Decryption> {
        if !self.holds_key_material(project) {
            return Ok(Decryption::Unavailable);
        }

        let key = self.master.derive_for_project(project);
        decrypt(&key, ciphertext).map(Decryption::Recovered)
    }
}

impl std::fmt::Debug for KeyringGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringGateway")
            .field("master", &"[REDACTED]")
            .field("keyed_projects", &self.keyed_projects.read().len())
            .finish()
    }
}
