//! BLAKE2b helpers
//!
//! Output lengths are part of the BLAKE2b parameter block, so a 24-byte digest
//! is not a truncated 32-byte one. Each helper fixes the length its callers
//! depend on.

use blake2::digest::consts::{U24, U32};
use blake2::digest::Mac;
use blake2::{Blake2b, Blake2b512, Blake2bMac, Digest};

/// Keyed BLAKE2b-256 over the concatenation of `parts`
pub(crate) fn keyed_hash(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    // keys up to 64 bytes are accepted; the key length is hashed in, so no padding
    let mut mac =
        Blake2bMac::<U32>::new_from_slice(key).expect("32-byte key is within BLAKE2b's limit");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Unkeyed BLAKE2b with a 24-byte digest over the concatenation of `parts`
pub(crate) fn hash_24(parts: &[&[u8]]) -> [u8; 24] {
    let mut hasher = Blake2b::<U24>::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Unkeyed BLAKE2b-512 over the concatenation of `parts`
pub(crate) fn hash_512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keyed_hash_matches_single_update() {
        let key = [9u8; 32];
        assert_eq!(
            keyed_hash(&key, &[b"ab", b"cd"]),
            keyed_hash(&key, &[b"abcd"])
        );
        assert_ne!(keyed_hash(&key, &[b"abcd"]), keyed_hash(&[8u8; 32], &[b"abcd"]));
    }

    #[test]
    fn test_hash_24_known_answer() {
        let digest = hash_24(&[&[1u8; 32], &[2u8; 32]]);
        assert_eq!(
            hex::encode(digest),
            "027c5e238eb720852760b596d6b470d4145a358c7629bf25"
        );
    }

    #[test]
    fn test_hash_512_length() {
        let digest = hash_512(&[b"q", b"client", b"server"]);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_512(&[b"qclientserver"]));
    }
}
