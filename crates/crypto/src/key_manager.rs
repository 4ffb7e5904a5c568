use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::backup_code::{self, BackupCodeError};
use crate::constants::{
    APPLICATION_NAMESPACE, BACKUP_CODE_IDENTIFIER, DEFAULT_TOKEN, DERIVED_KEY_SIZE,
    IDENTITY_KEY_NAME, MASTER_KEY_SIZE, NONCE_SIZE, PWHASH_MEM_LIMIT_KIB, PWHASH_OPS_LIMIT,
    PWHASH_PARALLELISM, ROOT_KEY_SIZE, TOKEN_SIZE,
};
use crate::encoding::z32_decode;
use crate::hash::keyed_hash;
use crate::keys::Keypair;

/// Errors that can occur in the key manager
#[derive(Debug, thiserror::Error)]
pub enum KeyManagerError {
    #[error("invalid root key: must be 16 bytes, got {0}")]
    InvalidRootKeyLength(usize),
    #[error("master key derivation failed: {0}")]
    MasterKeyDerivation(String),
    #[error("invalid token: must be at least 32 bytes, got {0}")]
    InvalidToken(usize),
    #[error("invalid project id: must decode to at least 24 bytes of z-base-32")]
    InvalidProjectId,
    #[error("local message encryption failed")]
    EncryptionFailure,
    #[error("failed to decrypt local message")]
    DecryptionFailure,
}

/// 16 random bytes that every key of a device is derived from
///
/// This is the only secret a device has to persist. Anyone holding it can
/// impersonate the device, so it is zeroed on drop and never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RootKey([u8; ROOT_KEY_SIZE]);

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootKey").field(&"[redacted]").finish()
    }
}

impl From<[u8; ROOT_KEY_SIZE]> for RootKey {
    fn from(bytes: [u8; ROOT_KEY_SIZE]) -> Self {
        RootKey(bytes)
    }
}

impl TryFrom<&[u8]> for RootKey {
    type Error = KeyManagerError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; ROOT_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyManagerError::InvalidRootKeyLength(bytes.len()))?;
        Ok(RootKey(bytes))
    }
}

impl RootKey {
    /// Generate a new random root key
    ///
    /// Only done once per device, the caller is responsible for storing it.
    pub fn generate() -> Self {
        let mut key = RootKey([0; ROOT_KEY_SIZE]);
        getrandom::getrandom(&mut key.0).expect("failed to generate random bytes");
        key
    }

    pub fn as_bytes(&self) -> &[u8; ROOT_KEY_SIZE] {
        &self.0
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey([u8; MASTER_KEY_SIZE]);

impl MasterKey {
    /// Argon2id with an empty password and the root key as salt
    ///
    /// The root key is kept short so it can be written down. The password hash
    /// makes brute forcing those 16 bytes expensive.
    fn derive(root_key: &RootKey) -> Result<Self, KeyManagerError> {
        let params = Params::new(
            PWHASH_MEM_LIMIT_KIB,
            PWHASH_OPS_LIMIT,
            PWHASH_PARALLELISM,
            Some(MASTER_KEY_SIZE),
        )
        .map_err(|e| KeyManagerError::MasterKeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut master_key = MasterKey([0; MASTER_KEY_SIZE]);
        argon2
            .hash_password_into(b"", root_key.as_bytes(), &mut master_key.0)
            .map_err(|e| KeyManagerError::MasterKeyDerivation(e.to_string()))?;
        Ok(master_key)
    }

    fn named_key(&self, name: &str, token: &[u8]) -> Zeroizing<[u8; DERIVED_KEY_SIZE]> {
        Zeroizing::new(keyed_hash(
            &self.0,
            &[APPLICATION_NAMESPACE, token, name.as_bytes()],
        ))
    }
}

/// Derives the keypairs identifying a device and its hypercores
///
/// All keys are derived deterministically from a single [`RootKey`]: two key
/// managers built from the same root key produce the same keys. The backup
/// code lets a user restore their identity on a new device.
pub struct KeyManager {
    root_key: RootKey,
    master_key: MasterKey,
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager").finish_non_exhaustive()
    }
}

impl KeyManager {
    pub const BACKUP_CODE_IDENTIFIER: char = BACKUP_CODE_IDENTIFIER;

    /// Create a key manager from raw root key bytes
    ///
    /// # Errors
    ///
    /// Returns an error if `root_key` is not exactly 16 bytes, or if the master
    /// key cannot be derived.
    pub fn new(root_key: &[u8]) -> Result<Self, KeyManagerError> {
        Self::from_root_key(RootKey::try_from(root_key)?)
    }

    /// Create a key manager from a root key
    pub fn from_root_key(root_key: RootKey) -> Result<Self, KeyManagerError> {
        let master_key = MasterKey::derive(&root_key)?;
        tracing::debug!("key manager initialized");
        Ok(Self {
            root_key,
            master_key,
        })
    }

    /// The root key this manager was created with
    pub fn root_key(&self) -> &RootKey {
        &self.root_key
    }

    /// Signing keypair identifying this device to other peers
    pub fn identity_keypair(&self) -> Keypair {
        self.signing_keypair(IDENTITY_KEY_NAME, &DEFAULT_TOKEN)
    }

    /// Signing keypair for the hypercore `name` in `namespace`
    pub fn hypercore_keypair(&self, name: &str, namespace: &[u8; TOKEN_SIZE]) -> Keypair {
        self.signing_keypair(name, namespace)
    }

    /// Raw 32-byte key derived for `name`, optionally namespaced by `token`
    ///
    /// # Errors
    ///
    /// Returns an error if `token` is shorter than 32 bytes.
    pub fn derived_key(
        &self,
        name: &str,
        token: Option<&[u8]>,
    ) -> Result<Zeroizing<[u8; DERIVED_KEY_SIZE]>, KeyManagerError> {
        let token: &[u8] = match token {
            Some(token) if token.len() < TOKEN_SIZE => {
                return Err(KeyManagerError::InvalidToken(token.len()))
            }
            Some(token) => token,
            None => &DEFAULT_TOKEN,
        };
        Ok(self.master_key.named_key(name, token))
    }

    /// Backup code for the root key of this device
    pub fn identity_backup_code(&self) -> String {
        backup_code::encode(&self.root_key)
    }

    /// Recover a root key from a backup code
    ///
    /// # Errors
    ///
    /// Returns an error if the code is malformed or fails its CRC check.
    pub fn decode_backup_code(code: &str) -> Result<RootKey, BackupCodeError> {
        backup_code::decode(code)
    }

    /// Encrypt a value for local storage under `project_id`
    ///
    /// The nonce is the first 24 bytes of the decoded project id, so it is the
    /// same for every message of a project. Only use this for data kept on this
    /// device; never send the output over the network.
    ///
    /// # Errors
    ///
    /// Returns an error if `project_id` is not a valid project id.
    pub fn encrypt_local_message(
        &self,
        message: &[u8],
        project_id: &str,
    ) -> Result<Vec<u8>, KeyManagerError> {
        let nonce = nonce_from_project_id(project_id)?;
        self.local_cipher()
            .encrypt(XNonce::from_slice(&nonce), message)
            .map_err(|_| KeyManagerError::EncryptionFailure)
    }

    /// Decrypt a value encrypted with [`KeyManager::encrypt_local_message`]
    ///
    /// # Errors
    ///
    /// Returns an error if `project_id` is invalid, or if the ciphertext does
    /// not authenticate under it.
    pub fn decrypt_local_message(
        &self,
        ciphertext: &[u8],
        project_id: &str,
    ) -> Result<Vec<u8>, KeyManagerError> {
        let nonce = nonce_from_project_id(project_id)?;
        self.local_cipher()
            .decrypt(XNonce::from_slice(&nonce), ciphertext)
            .map_err(|_| {
                tracing::debug!("local message failed to authenticate");
                KeyManagerError::DecryptionFailure
            })
    }

    /// Generate a new random root key
    pub fn generate_root_key() -> RootKey {
        RootKey::generate()
    }

    /// Generate the keypair for a new project
    ///
    /// The public key becomes the project key. Not deterministic: the caller
    /// must persist it.
    pub fn generate_project_keypair() -> Keypair {
        Keypair::generate()
    }

    fn signing_keypair(&self, name: &str, token: &[u8]) -> Keypair {
        let seed = self.master_key.named_key(name, token);
        Keypair::from_seed(&seed)
    }

    fn local_cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.master_key.0))
    }
}

fn nonce_from_project_id(project_id: &str) -> Result<[u8; NONCE_SIZE], KeyManagerError> {
    let decoded =
        Zeroizing::new(z32_decode(project_id).map_err(|_| KeyManagerError::InvalidProjectId)?);
    let prefix = decoded
        .get(..NONCE_SIZE)
        .ok_or(KeyManagerError::InvalidProjectId)?;
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(prefix);
    Ok(nonce)
}
