//! Core domain types and pure logic for docvault.
//!
//! This crate defines the data model shared by every other crate:
//! - The chunk codec (split a base64 payload into bounded pieces and join them back)
//! - Document identifiers, chunk records and document metadata
//! - Payload helpers for `data:` URIs and base64 decoding
//! - Configuration types

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod payload;

pub use codec::{chunk_count, join, split, text_len};
pub use document::{
    CHUNK_COLLECTION, ChunkRecord, DocumentDescriptor, DocumentId, DocumentMetadata,
    METADATA_COLLECTION, chunk_key,
};
pub use error::{Error, Result};
pub use payload::{DataUri, decode_payload, encode_payload, to_data_uri};

/// Default chunk size: 800 KiB of base64 text.
pub const DEFAULT_CHUNK_SIZE: usize = 800 * 1024;

/// Default per-record ceiling of the target document store: 1 MiB.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Room left under the record ceiling for the fields stored next to `data`.
pub const RECORD_OVERHEAD_MARGIN: usize = 16 * 1024;

/// Default MIME type for stored documents.
pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";
