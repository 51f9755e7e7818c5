//! Reassembly of fetched chunks into one contiguous blob.

use bytes::{Bytes, BytesMut};

use crate::range::ByteRange;

/// One fetched chunk: the range it was requested for and its payload.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub range: ByteRange,
    pub bytes: Bytes,
}

/// A fully reassembled resource, paired with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub bytes: Bytes,
    pub content_type: String,
}

impl Content {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Concatenate chunk payloads, already ordered by ascending `start`, into a
/// single byte sequence.
///
/// Contiguity and coverage are the planner's invariant and are not
/// re-checked here; a violated plan produces corrupt output, which the
/// planner's own tests exist to rule out.
pub fn assemble(chunks: Vec<ChunkPayload>, content_type: String) -> Content {
    let total = chunks.iter().map(|c| c.bytes.len()).sum();
    let mut buf = BytesMut::with_capacity(total);
    for chunk in chunks {
        buf.extend_from_slice(&chunk.bytes);
    }
    Content { bytes: buf.freeze(), content_type }
}
