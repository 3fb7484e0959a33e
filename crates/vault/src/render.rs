//! Seam for the document-producing renderer.

use async_trait::async_trait;
use docvault_core::encode_payload;

/// Error type renderers report.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// A rendered document ready to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Base64 payload, bare or as a `data:` URI.
    pub payload: String,
    /// Size of the rendered binary in bytes.
    pub size: usize,
}

impl RenderedDocument {
    /// Wrap raw rendered bytes as a data URI payload.
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Self {
        Self {
            payload: encode_payload(bytes, mime),
            size: bytes.len(),
        }
    }
}

/// Produces a document payload from structured input.
///
/// The vault treats the output as opaque.
#[async_trait]
pub trait DocumentRenderer<I: ?Sized + Sync>: Send + Sync {
    async fn render(&self, input: &I) -> Result<RenderedDocument, RenderError>;
}
