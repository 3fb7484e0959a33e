//! Chunk codec: split a payload into bounded pieces and join them back.
//!
//! Both functions are pure. Lengths are measured in characters; base64 text is
//! ASCII so for real payloads a character is a byte and slicing is by offset.

use crate::{Error, Result};

/// Number of chunks a payload of `len` characters is split into.
///
/// An empty payload still occupies one (empty) chunk.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1)).max(1)
}

/// Length of `s` in characters.
pub fn text_len(s: &str) -> usize {
    if s.is_ascii() {
        s.len()
    } else {
        s.chars().count()
    }
}

/// Split `payload` into ordered pieces of `chunk_size` characters.
///
/// Every piece except possibly the last holds exactly `chunk_size` characters.
/// The pieces borrow from `payload`.
pub fn split(payload: &str, chunk_size: usize) -> Result<Vec<&str>> {
    if chunk_size == 0 {
        return Err(Error::InvalidChunkSize {
            size: chunk_size,
            max: usize::MAX,
        });
    }

    if payload.is_empty() {
        return Ok(vec![""]);
    }

    if payload.is_ascii() {
        let len = payload.len();
        return Ok((0..len)
            .step_by(chunk_size)
            .map(|start| &payload[start..(start + chunk_size).min(len)])
            .collect());
    }

    let mut pieces = Vec::with_capacity(chunk_count(payload.len(), chunk_size));
    let mut start = 0;
    let mut taken = 0;
    for (idx, _) in payload.char_indices() {
        if taken == chunk_size {
            pieces.push(&payload[start..idx]);
            start = idx;
            taken = 0;
        }
        taken += 1;
    }
    pieces.push(&payload[start..]);
    Ok(pieces)
}

/// Concatenate pieces in the order given.
///
/// Count and index continuity are the caller's concern.
pub fn join<'a, I>(pieces: I) -> String
where
    I: IntoIterator<Item = &'a str>,
    I::IntoIter: Clone,
{
    let pieces = pieces.into_iter();
    let total = pieces.clone().map(str::len).sum();
    let mut out = String::with_capacity(total);
    for piece in pieces {
        out.push_str(piece);
    }
    out
}
