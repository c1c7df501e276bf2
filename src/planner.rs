//! Chunk planning
//!
//! Decides whether an encoded payload fits in one store value or has to be
//! split. The threshold is counted in encoded characters, so it already
//! includes the base64 expansion and can be compared directly against the
//! store's per-value ceiling.

use crate::{Error, Result};

/// How an encoded payload is laid out in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkPlan<'a> {
    /// Fits in a single value
    Inline(&'a str),
    /// Contiguous, ordered slices, none longer than the threshold
    Chunked(Vec<&'a str>),
}

impl<'a> ChunkPlan<'a> {
    /// Plan the layout of `payload` for a chunk threshold of `threshold` characters
    pub fn plan(payload: &'a str, threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::Config("chunk threshold must be positive".into()));
        }
        if payload.len() <= threshold {
            return Ok(ChunkPlan::Inline(payload));
        }

        let mut chunks = Vec::with_capacity(payload.len().div_ceil(threshold));
        let mut rest = payload;
        while !rest.is_empty() {
            let mut cut = threshold.min(rest.len());
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                return Err(Error::Config(format!(
                    "chunk threshold {} is smaller than one character",
                    threshold
                )));
            }
            let (head, tail) = rest.split_at(cut);
            chunks.push(head);
            rest = tail;
        }
        Ok(ChunkPlan::Chunked(chunks))
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, ChunkPlan::Chunked(_))
    }

    /// The slices in store order; a single slice when inline
    pub fn chunks(&self) -> Vec<&'a str> {
        match self {
            ChunkPlan::Inline(payload) => vec![*payload],
            ChunkPlan::Chunked(chunks) => chunks.clone(),
        }
    }

    /// Number of chunk keys the plan needs (zero when inline)
    pub fn total_chunks(&self) -> u32 {
        match self {
            ChunkPlan::Inline(_) => 0,
            ChunkPlan::Chunked(chunks) => chunks.len() as u32,
        }
    }
}
