//! Payload helpers: `data:` URIs and base64 decoding.
//!
//! The store treats payloads as opaque text. Consumers that need bytes or an
//! embeddable URI go through these helpers.

use crate::{Error, Result};
use base64::{Engine as _, engine::general_purpose};
use std::borrow::Cow;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// A parsed `data:<mime>;base64,<body>` URI borrowing from its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub body: &'a str,
}

impl<'a> DataUri<'a> {
    /// Parse a base64 data URI. Returns `None` for anything else.
    pub fn parse(s: &'a str) -> Option<Self> {
        let rest = s.strip_prefix(DATA_PREFIX)?;
        let marker = rest.find(BASE64_MARKER)?;
        Some(Self {
            mime: &rest[..marker],
            body: &rest[marker + BASE64_MARKER.len()..],
        })
    }
}

/// The base64 body of a payload, with any data URI prefix removed.
pub fn base64_body(payload: &str) -> &str {
    DataUri::parse(payload).map_or(payload, |uri| uri.body)
}

/// Decode a payload (bare base64 or a data URI) into raw bytes.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let body = base64_body(payload);
    let decoded = if body.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        general_purpose::STANDARD.decode(compact)
    } else {
        general_purpose::STANDARD.decode(body)
    };
    decoded.map_err(|e| Error::MalformedPayload(format!("invalid base64: {e}")))
}

/// Encode raw bytes as a data URI.
pub fn encode_payload(bytes: &[u8], mime: &str) -> String {
    format!(
        "{DATA_PREFIX}{mime}{BASE64_MARKER}{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Return the payload as a data URI, wrapping a bare base64 body with `mime`.
pub fn to_data_uri<'a>(payload: &'a str, mime: &str) -> Cow<'a, str> {
    if DataUri::parse(payload).is_some() {
        Cow::Borrowed(payload)
    } else {
        Cow::Owned(format!("{DATA_PREFIX}{mime}{BASE64_MARKER}{payload}"))
    }
}
