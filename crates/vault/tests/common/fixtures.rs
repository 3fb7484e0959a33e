use docvault::DocumentVault;
use docvault_core::config::VaultConfig;
use docvault_core::payload::base64_body;
use docvault_core::{DocumentDescriptor, encode_payload};
use docvault_storage::MemoryStore;
use std::sync::Arc;

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// Bare base64 of `bytes`.
#[allow(dead_code)]
pub fn base64_of(bytes: &[u8]) -> String {
    base64_body(&encode_payload(bytes, "application/octet-stream")).to_string()
}

/// A base64-alphabet string of exactly `len` characters.
#[allow(dead_code)]
pub fn payload_of_len(seed: u64, len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    seeded_bytes(seed, len)
        .into_iter()
        .map(|b| ALPHABET[(b % 64) as usize] as char)
        .collect()
}

#[allow(dead_code)]
pub fn vault_config(chunk_size: usize) -> VaultConfig {
    VaultConfig {
        chunk_size,
        ..VaultConfig::default()
    }
}

#[allow(dead_code)]
pub fn descriptor(filename: &str) -> DocumentDescriptor {
    DocumentDescriptor::new(filename)
        .with_ref("owner", "client-7")
        .with_ref("kind", "invoice")
}

/// A vault over a fresh in-memory store.
#[allow(dead_code)]
pub fn memory_vault(chunk_size: usize) -> (Arc<MemoryStore>, DocumentVault) {
    let store = Arc::new(MemoryStore::default());
    let vault = DocumentVault::new(store.clone(), vault_config(chunk_size)).unwrap();
    (store, vault)
}
