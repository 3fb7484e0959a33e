pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{base64_of, descriptor, memory_vault, payload_of_len, seeded_bytes, vault_config};
#[allow(unused_imports)]
pub use mocks::{FaultyStore, InstrumentedStore};
