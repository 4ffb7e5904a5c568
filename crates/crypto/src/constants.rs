//! Fixed sizes, domain tags and cost parameters.
//!
//! Every value here feeds into key derivation or a wire format. Changing any
//! of them changes the identity derived from an existing root key, or makes
//! previously encoded messages undecodable.

/// Size of the device root key in bytes
pub const ROOT_KEY_SIZE: usize = 16;
/// Size of the master key derived from the root key
pub const MASTER_KEY_SIZE: usize = 32;
/// Size of a named key derived from the master key
pub const DERIVED_KEY_SIZE: usize = 32;
/// Minimum size of a derivation token (namespace)
pub const TOKEN_SIZE: usize = 32;

/// Size of an Ed25519 public key
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of an Ed25519 seed
pub const SEED_SIZE: usize = 32;
/// Size of a signing secret key in its `seed || public key` form
pub const SECRET_KEY_SIZE: usize = 64;
/// Size of a detached Ed25519 signature
pub const SIGNATURE_SIZE: usize = 64;
/// Size of an X25519 key (public or secret)
pub const EXCHANGE_KEY_SIZE: usize = 32;

/// PEM label for the raw 64-byte secret key form, which is not PKCS#8
pub const SECRET_KEY_PEM_TAG: &str = "ED25519 SECRET KEY";

/// Size of a key exchange session key
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of the XSalsa20 / XChaCha20 nonce
pub const NONCE_SIZE: usize = 24;
/// Size of the Poly1305 authentication tag
pub const MAC_SIZE: usize = 16;

/// Argon2id iterations (libsodium `OPSLIMIT_INTERACTIVE`)
pub const PWHASH_OPS_LIMIT: u32 = 2;
/// Argon2id memory in KiB (libsodium `MEMLIMIT_INTERACTIVE`, 64 MiB)
pub const PWHASH_MEM_LIMIT_KIB: u32 = 64 * 1024;
/// Argon2id lanes
pub const PWHASH_PARALLELISM: u32 = 1;

/// Prefix mixed into every named key derivation
pub const APPLICATION_NAMESPACE: &[u8] = b"@mapeo/crypto";
/// Token used when a named key is derived without one
pub const DEFAULT_TOKEN: [u8; TOKEN_SIZE] = [0; TOKEN_SIZE];
/// Name of the key that seeds the device identity keypair
pub const IDENTITY_KEY_NAME: &str = "identity";

/// Hash input for public identifiers
pub const PUBLIC_ID_DOMAIN: &[u8] = b"mapeo";
/// Hash input for invite identifiers
pub const INVITE_ID_DOMAIN: &[u8] = b"mapeo project invite id";

/// First character of every backup code
pub const BACKUP_CODE_IDENTIFIER: char = 'M';
/// Length of an encoded backup code, identifier included
pub const BACKUP_CODE_LENGTH: usize = 30;
/// Size of the raw backup code (root key and CRC16)
pub const BACKUP_CODE_BYTES: usize = ROOT_KEY_SIZE + 2;

/// Wire version of join requests
pub const JOIN_REQUEST_VERSION: u64 = 1;
/// Wire version of invites
pub const INVITE_VERSION: u64 = 1;
/// Wire version of invite secret messages
pub const INVITE_SECRET_MESSAGE_VERSION: u64 = 1;

/// Type tag of join requests
pub const JOIN_REQUEST_TYPE: u8 = b'J';
/// Type tag of invites
pub const INVITE_TYPE: u8 = b'I';
/// Type tag of invite secret messages
pub const INVITE_SECRET_MESSAGE_TYPE: u8 = b'S';
