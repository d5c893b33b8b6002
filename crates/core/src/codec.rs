//! Vector codec for on-disk storage.
//!
//! A vector is downcast to IEEE half precision, the little-endian bytes are
//! zlib-compressed, and the result is base64-encoded so it can live inside a
//! JSON record. Decoding reverses each step and upcasts back to `f32`; the only
//! loss is the f16 rounding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use half::f16;
use std::io::{Read, Write};
use thiserror::Error;

/// Failure encoding or decoding a stored vector.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("zlib stream error: {0}")]
    Zlib(#[from] std::io::Error),
    #[error("decompressed length {0} is not a multiple of 2")]
    OddLength(usize),
}

/// Compress a vector to its base64 text form.
pub fn compress(vector: &[f32]) -> Result<String, CodecError> {
    let mut raw = Vec::with_capacity(vector.len() * 2);
    for &v in vector {
        raw.extend_from_slice(&f16::from_f32(v).to_le_bytes());
    }

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len()), Compression::default());
    encoder.write_all(&raw)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

/// Decode a vector produced by [`compress`].
pub fn decompress(encoded: &str) -> Result<Vec<f32>, CodecError> {
    let compressed = STANDARD.decode(encoded)?;
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut raw)?;
    if raw.len() % 2 != 0 {
        return Err(CodecError::OddLength(raw.len()));
    }
    Ok(raw
        .chunks_exact(2)
        .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
        .collect())
}

/// Round `vector` through f16, matching what a compress/decompress cycle yields.
pub fn to_storage_precision(vector: &[f32]) -> Vec<f32> {
    vector.iter().map(|&v| f16::from_f32(v).to_f32()).collect()
}
