//! Signatures and public identifiers

pub use ed25519_dalek::Signature;

use crate::constants::{INVITE_ID_DOMAIN, PUBLIC_ID_DOMAIN};
use crate::encoding::z32_encode;
use crate::hash::keyed_hash;
use crate::keys::{PublicKey, SecretKey};

/// Detached Ed25519 signature of `message`
pub fn sign(message: &[u8], secret_key: &SecretKey) -> Signature {
    secret_key.sign(message)
}

/// Whether `signature` is a valid signature of `message` by `public_key`
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    public_key.verify(message, signature).is_ok()
}

/// Public identifier of a key, e.g. the project id of a project key
///
/// One-way: the id can be shared without revealing the key.
pub fn key_to_public_id(key: &[u8; 32]) -> String {
    z32_encode(&keyed_hash(key, &[PUBLIC_ID_DOMAIN]))
}

/// Identifier of the invite capability for a key
///
/// Uses a different domain than [`key_to_public_id`], so the two never match.
pub fn key_to_invite_id(key: &[u8; 32]) -> [u8; 32] {
    keyed_hash(key, &[INVITE_ID_DOMAIN])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let secret_key = SecretKey::generate();
        let public_key = secret_key.public();
        let signature = sign(b"message", &secret_key);

        assert!(verify_signature(b"message", &signature, &public_key));
        assert!(!verify_signature(b"massage", &signature, &public_key));
        assert!(!verify_signature(
            b"message",
            &signature,
            &SecretKey::generate().public()
        ));
    }

    #[test]
    fn test_public_and_invite_ids_differ() {
        let key = [5u8; 32];
        let public_id = key_to_public_id(&key);
        assert_eq!(public_id.len(), 52);
        assert_ne!(crate::encoding::z32_decode(&public_id).unwrap(), key_to_invite_id(&key));
        assert_eq!(public_id, key_to_public_id(&key));
    }
}
