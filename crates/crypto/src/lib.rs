/**
 * Backup codes: the root key as 30 characters
 *  a person can write down, with a CRC16
 *  to catch transcription mistakes.
 */
pub mod backup_code;
/**
 * Sizes, domain tags and versions. Changing any of
 *  these changes derived identities or the wire format.
 */
pub mod constants;
/**
 * String encodings for QR codes, links
 *  and public identifiers.
 */
pub mod encoding;
mod hash;
/**
 * Sealing invite messages to a device identity
 *  with an ephemeral key exchange.
 */
pub mod invite;
/**
 * The join request / invite exchange used to
 *  add a device to a project.
 */
pub mod invites;
/**
 * Deterministic derivation of every key a device
 *  uses from a single 16-byte root key.
 */
pub mod key_manager;
/**
 * Signing keypairs and single-use
 *  exchange keypairs.
 */
pub mod keys;
/**
 * Versioned binary messages with a type-checked
 *  header.
 */
pub mod message;
/**
 * Signatures and public identifiers
 *  derived from keys.
 */
pub mod utils;

pub mod prelude {
    pub use crate::backup_code::BackupCodeError;
    pub use crate::encoding::{Encoding, EncodingError};
    pub use crate::invite::InviteCryptoError;
    pub use crate::invites::{
        decode_invite_secret_message, decode_join_request, encode_join_request, generate_invite,
        InviteError, InviteOptions,
    };
    pub use crate::key_manager::{KeyManager, KeyManagerError, RootKey};
    pub use crate::keys::{ExchangeKeypair, KeyError, Keypair, PublicKey, SecretKey};
    pub use crate::message::{
        Invite, InviteSecretMessage, JoinRequest, Message, MessageError, MessageKind,
    };
    pub use crate::utils::{
        key_to_invite_id, key_to_public_id, sign, verify_signature, Signature,
    };
}
