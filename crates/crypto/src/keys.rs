use std::fmt;

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::constants::{
    EXCHANGE_KEY_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_PEM_TAG, SECRET_KEY_SIZE, SEED_SIZE,
};

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid key length, expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid key: not a valid ed25519 point")]
    InvalidPoint,
    #[error("invalid key: secret key does not match its public half")]
    Mismatch,
    #[error("invalid key: hex decode error")]
    InvalidHex,
    #[error("invalid key: {0}")]
    Pem(String),
    #[error("invalid signature")]
    InvalidSignature,
}

/// Ed25519 public key identifying a device or a project
///
/// Held as raw bytes: a join request may carry any 32 bytes, and the point is
/// only validated when the key is actually used for verification or
/// encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl From<[u8; PUBLIC_KEY_SIZE]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }
}

impl From<PublicKey> for [u8; PUBLIC_KEY_SIZE] {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(PublicKey(bytes))
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| KeyError::InvalidHex)?;
        Ok(buff.into())
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    /// Convert public key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Convert Ed25519 public key to X25519 (Montgomery curve) for key exchange
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid Edwards point.
    #[allow(clippy::wrong_self_convention)]
    pub(crate) fn to_x25519(&self) -> Result<X25519PublicKey, KeyError> {
        let edwards_point = CompressedEdwardsY(self.0)
            .decompress()
            .ok_or(KeyError::InvalidPoint)?;
        let montgomery_point = edwards_point.to_montgomery();
        Ok(X25519PublicKey::from(montgomery_point.to_bytes()))
    }

    /// Verify a detached Ed25519 signature on a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid point or the signature does
    /// not verify.
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> Result<(), KeyError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| KeyError::InvalidPoint)?;
        verifying_key
            .verify_strict(msg, signature)
            .map_err(|_| KeyError::InvalidSignature)
    }
}

/// Ed25519 signing secret key
///
/// The byte form is the 64-byte `seed || public key` layout used by libsodium,
/// so secret keys can be exchanged with other Mapeo implementations. The inner
/// signing key is zeroed on drop.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&"[redacted]").finish()
    }
}

impl TryFrom<&[u8]> for SecretKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: &[u8; SECRET_KEY_SIZE] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: SECRET_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Self::from_bytes(bytes)
    }
}

impl SecretKey {
    /// Deterministically create a secret key from a 32-byte seed
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    /// Parse a secret key from its 64-byte `seed || public key` form
    ///
    /// # Errors
    ///
    /// Returns an error if the public half does not match the seed.
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_SIZE]) -> Result<Self, KeyError> {
        SigningKey::from_keypair_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::Mismatch)
    }

    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut seed = zeroize::Zeroizing::new([0u8; SEED_SIZE]);
        getrandom::getrandom(&mut seed[..]).expect("failed to generate random bytes");
        Self::from_seed(&seed)
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Secret key in its 64-byte `seed || public key` form
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.0.to_keypair_bytes()
    }

    /// Parse a secret key from a hexadecimal string of the 64-byte form
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = zeroize::Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        hex::decode_to_slice(hex, &mut buff[..]).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&buff)
    }

    /// Convert secret key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encode secret key in PEM format for storage
    ///
    /// Project keypairs are random, so whoever creates a project has to
    /// persist its secret key somewhere.
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new(SECRET_KEY_PEM_TAG, self.to_bytes().to_vec());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "ED25519 SECRET KEY"
    /// - The key size is incorrect
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem =
            pem::parse(pem_str).map_err(|e| KeyError::Pem(format!("failed to parse PEM: {e}")))?;

        if pem.tag() != SECRET_KEY_PEM_TAG {
            return Err(KeyError::Pem(format!(
                "invalid PEM tag, expected {SECRET_KEY_PEM_TAG}"
            )));
        }

        Self::try_from(pem.contents())
    }

    /// Convert Ed25519 secret key to X25519 for key exchange
    ///
    /// Uses the clamped-on-use scalar half of SHA-512(seed), the same
    /// conversion as libsodium's `crypto_sign_ed25519_sk_to_curve25519`.
    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0.to_scalar_bytes())
    }

    /// Sign a message with this secret key using Ed25519.
    ///
    /// Returns a detached signature that can be verified with the
    /// corresponding public key.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        self.0.sign(msg)
    }
}

/// Ed25519 signing keypair
#[derive(Debug, Clone)]
pub struct Keypair {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
}

impl Keypair {
    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        SecretKey::from_seed(seed).into()
    }

    /// Random keypair
    pub fn generate() -> Self {
        SecretKey::generate().into()
    }

    /// Whether the public key is the one derived from the secret key
    pub fn is_valid(&self) -> bool {
        self.secret_key.public() == self.public_key
    }
}

impl From<SecretKey> for Keypair {
    fn from(secret_key: SecretKey) -> Self {
        Self {
            public_key: secret_key.public(),
            secret_key,
        }
    }
}

/// Single-use X25519 keypair for encrypting one invite
///
/// Never derived, never persisted. The secret half is zeroed on drop.
pub struct ExchangeKeypair {
    public_key: X25519PublicKey,
    secret_key: StaticSecret,
}

impl fmt::Debug for ExchangeKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeKeypair")
            .field("public_key", &hex::encode(self.public_key.as_bytes()))
            .finish_non_exhaustive()
    }
}

impl ExchangeKeypair {
    /// Generate a fresh random exchange keypair
    pub fn generate() -> Self {
        let mut bytes = zeroize::Zeroizing::new([0u8; EXCHANGE_KEY_SIZE]);
        getrandom::getrandom(&mut bytes[..]).expect("failed to generate random bytes");
        let secret_key = StaticSecret::from(*bytes);
        Self {
            public_key: X25519PublicKey::from(&secret_key),
            secret_key,
        }
    }

    /// Public half, sent alongside the encrypted message
    pub fn public_key(&self) -> [u8; EXCHANGE_KEY_SIZE] {
        self.public_key.to_bytes()
    }

    pub(crate) fn secret_key(&self) -> &StaticSecret {
        &self.secret_key
    }

    /// Whether the public key is the one derived from the secret key
    pub fn is_valid(&self) -> bool {
        X25519PublicKey::from(&self.secret_key) == self.public_key
    }
}
