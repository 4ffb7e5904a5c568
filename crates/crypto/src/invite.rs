//! Sealing invites to a device identity
//!
//! The inviter encrypts to the joiner's Ed25519 identity key with a fresh
//! X25519 keypair:
//!
//! 1. Convert the joiner's identity public key to X25519.
//! 2. Run a libsodium compatible key exchange with the ephemeral keypair as
//!    the server and the joiner as the client. The server transmit key equals
//!    the client receive key.
//! 3. Derive the nonce by hashing the ephemeral public key and the joiner's
//!    identity public key. The ephemeral key is new for every invite, so the
//!    nonce is too.
//! 4. Seal with XSalsa20-Poly1305, output is `tag || ciphertext`.
//!
//! The joiner converts its identity keypair to X25519 and runs the client side
//! of the exchange against the ephemeral public key sent with the invite.

use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::constants::{EXCHANGE_KEY_SIZE, MAC_SIZE, NONCE_SIZE, SESSION_KEY_SIZE};
use crate::hash::{hash_24, hash_512};
use crate::keys::{ExchangeKeypair, PublicKey, SecretKey};

/// Errors that can occur when sealing or opening an invite
#[derive(Debug, thiserror::Error)]
pub enum InviteCryptoError {
    #[error("invalid encrypted message: must be longer than 16 bytes, got {0}")]
    CiphertextTooShort(usize),
    #[error("invalid public key: cannot be converted for key exchange")]
    InvalidPublicKey,
    #[error("invalid key exchange: shared secret is not contributory")]
    WeakKeyExchange,
    #[error("failed to encrypt secret message")]
    EncryptionFailure,
    #[error("failed to decrypt secret message")]
    DecryptionFailure,
}

/// Encrypt `message` for the device with identity `receiver_public_key`
///
/// `sender` must be a fresh keypair used for this message only. Its public
/// key has to travel with the ciphertext.
///
/// # Errors
///
/// Returns an error if the receiver key is not a valid Ed25519 point or the
/// key exchange is degenerate.
pub fn encrypt_message(
    message: &[u8],
    sender: &ExchangeKeypair,
    receiver_public_key: &PublicKey,
) -> Result<Vec<u8>, InviteCryptoError> {
    let receiver_exchange_key = receiver_public_key
        .to_x25519()
        .map_err(|_| InviteCryptoError::InvalidPublicKey)?;

    let sender_public_key = sender.public_key();
    let tx = server_transmit_key(
        sender.secret_key(),
        &sender_public_key,
        &receiver_exchange_key,
    )?;
    let nonce = generate_nonce(&sender_public_key, receiver_public_key);

    XSalsa20Poly1305::new(Key::from_slice(&tx[..]))
        .encrypt(Nonce::from_slice(&nonce), message)
        .map_err(|_| InviteCryptoError::EncryptionFailure)
}

/// Decrypt a message encrypted with [`encrypt_message`]
///
/// `receiver_public_key` and `receiver_secret_key` are the identity keypair
/// of this device, `sender_public_key` is the ephemeral key sent alongside
/// the ciphertext. Nothing is returned unless the message authenticates.
///
/// # Errors
///
/// Returns an error if the ciphertext is too short to hold a tag, the keys
/// are invalid, or authentication fails.
pub fn decrypt_message(
    encrypted_message: &[u8],
    receiver_public_key: &PublicKey,
    receiver_secret_key: &SecretKey,
    sender_public_key: &[u8; EXCHANGE_KEY_SIZE],
) -> Result<Vec<u8>, InviteCryptoError> {
    if encrypted_message.len() <= MAC_SIZE {
        return Err(InviteCryptoError::CiphertextTooShort(
            encrypted_message.len(),
        ));
    }

    let receiver_exchange_public = receiver_public_key
        .to_x25519()
        .map_err(|_| InviteCryptoError::InvalidPublicKey)?;
    let receiver_exchange_secret = receiver_secret_key.to_x25519();

    let rx = client_receive_key(
        &receiver_exchange_secret,
        &receiver_exchange_public,
        sender_public_key,
    )?;
    let nonce = generate_nonce(sender_public_key, receiver_public_key);

    XSalsa20Poly1305::new(Key::from_slice(&rx[..]))
        .decrypt(Nonce::from_slice(&nonce), encrypted_message)
        .map_err(|_| {
            tracing::debug!(len = encrypted_message.len(), "invite failed to authenticate");
            InviteCryptoError::DecryptionFailure
        })
}

/// Hash of the ephemeral public key and the receiver's identity public key,
/// as in a sealed box
fn generate_nonce(
    sender_public_key: &[u8; EXCHANGE_KEY_SIZE],
    receiver_public_key: &PublicKey,
) -> [u8; NONCE_SIZE] {
    hash_24(&[sender_public_key, receiver_public_key.as_bytes()])
}

// libsodium crypto_kx: BLAKE2b-512(q || client_pk || server_pk), where the
// server transmits with the first half and the client receives with it.

fn server_transmit_key(
    server_secret: &StaticSecret,
    server_public: &[u8; EXCHANGE_KEY_SIZE],
    client_public: &X25519PublicKey,
) -> Result<Zeroizing<[u8; SESSION_KEY_SIZE]>, InviteCryptoError> {
    let shared = server_secret.diffie_hellman(client_public);
    if !shared.was_contributory() {
        return Err(InviteCryptoError::WeakKeyExchange);
    }
    Ok(first_session_key(
        shared.as_bytes(),
        client_public.as_bytes(),
        server_public,
    ))
}

fn client_receive_key(
    client_secret: &StaticSecret,
    client_public: &X25519PublicKey,
    server_public: &[u8; EXCHANGE_KEY_SIZE],
) -> Result<Zeroizing<[u8; SESSION_KEY_SIZE]>, InviteCryptoError> {
    let shared = client_secret.diffie_hellman(&X25519PublicKey::from(*server_public));
    if !shared.was_contributory() {
        return Err(InviteCryptoError::WeakKeyExchange);
    }
    Ok(first_session_key(
        shared.as_bytes(),
        client_public.as_bytes(),
        server_public,
    ))
}

fn first_session_key(
    shared: &[u8; 32],
    client_public: &[u8; EXCHANGE_KEY_SIZE],
    server_public: &[u8; EXCHANGE_KEY_SIZE],
) -> Zeroizing<[u8; SESSION_KEY_SIZE]> {
    let keys = Zeroizing::new(hash_512(&[shared, client_public, server_public]));
    let mut key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
    key.copy_from_slice(&keys[..SESSION_KEY_SIZE]);
    key
}
