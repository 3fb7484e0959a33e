//! Chunked document storage and reconstruction for docvault.
//!
//! Documents are base64 payloads too large for one record of the target
//! store. This crate provides:
//! - A writer that splits a payload into chunk records plus one metadata record
//! - A reader that verifies completeness and reassembles the exact payload
//! - A facade with download, inline rendering and batch helpers
//! - A bounded, expiring cache of reconstructed documents
//! - An out-of-band sweeper for chunks orphaned by interrupted stores

pub mod batch;
pub mod cache;
pub mod error;
pub mod facade;
pub mod reader;
mod records;
pub mod render;
pub mod sweep;
pub mod writer;

pub use batch::{BatchItem, BatchReport};
pub use cache::{CacheStats, DocumentCache};
pub use error::{VaultError, VaultResult};
pub use facade::DocumentVault;
pub use reader::{Reconstructor, verify_and_order};
pub use render::{DocumentRenderer, RenderError, RenderedDocument};
pub use sweep::{OrphanSweeper, SweepStats};
pub use writer::ChunkWriter;
