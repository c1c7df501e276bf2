//! Binary/text codec for blob payloads
//!
//! Blobs are stored as standard padded base64. Both directions work in fixed
//! batches and append into one preallocated buffer, so no single conversion
//! touches more than a batch of input at a time.
//!
//! The encode batch is a multiple of 3 bytes, which means every batch except
//! the last encodes to unpadded text and the concatenation is identical to
//! encoding the whole buffer at once. The decode batch is the matching
//! multiple of 4 characters.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::{Error, Result};

/// Raw bytes per encode batch (24 KiB, divisible by 3)
pub const ENCODE_BATCH: usize = 24 * 1024;

/// Encoded characters per decode batch (32 KiB, divisible by 4)
pub const DECODE_BATCH: usize = ENCODE_BATCH / 3 * 4;

/// Length of the encoded form of `raw_len` bytes
pub fn encoded_len(raw_len: usize) -> usize {
    raw_len.div_ceil(3) * 4
}

/// Encode raw bytes to base64 text
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(bytes.len()));
    for batch in bytes.chunks(ENCODE_BATCH) {
        STANDARD.encode_string(batch, &mut out);
    }
    out
}

/// Decode base64 text back to raw bytes
///
/// Malformed input is reported as [`Error::CorruptBlob`].
pub fn decode(text: &str) -> Result<Bytes> {
    let input = text.as_bytes();
    if input.len() % 4 != 0 {
        return Err(Error::CorruptBlob(format!(
            "encoded length {} is not a multiple of 4",
            input.len()
        )));
    }

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let batches = input.len().div_ceil(DECODE_BATCH);
    for (i, batch) in input.chunks(DECODE_BATCH).enumerate() {
        // Padding is only legal at the very end of the payload
        if i + 1 < batches && batch.last() == Some(&b'=') {
            return Err(Error::CorruptBlob(format!(
                "padding before end of payload in batch {}",
                i
            )));
        }
        STANDARD
            .decode_vec(batch, &mut out)
            .map_err(|e| Error::CorruptBlob(format!("batch {}: {}", i, e)))?;
    }
    Ok(Bytes::from(out))
}
