//! Shared helpers for integration tests
#![allow(dead_code)]

use mapeo_crypto::key_manager::{KeyManager, RootKey};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Key manager for a fresh random root key
pub fn setup_key_manager() -> KeyManager {
    init_tracing();
    KeyManager::from_root_key(RootKey::generate()).unwrap()
}

/// Decode a hex string into a fixed-size array
pub fn from_hex<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out).unwrap();
    out
}
