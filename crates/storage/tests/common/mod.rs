pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{BackendKind, chunk_fields, make_store, record};
