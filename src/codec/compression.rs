//! Compression backends for transaction payloads
//!
//! The codec only depends on the [`Compressor`] contract, so the algorithm
//! can be swapped without touching the wire format handling.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Compress/decompress contract used by [`crate::codec::TxCodec`]
pub trait Compressor: Send + Sync {
    /// Compress raw bytes
    fn compress(&self, data: &[u8]) -> Bytes;

    /// Reverse [`Compressor::compress`]
    fn decompress(&self, data: &[u8]) -> Result<Bytes, CompressionError>;
}

/// Built-in compression modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Pass-through, useful for debugging captured SMS bodies
    None,
    /// Raw LZ4 block, no size header
    #[default]
    Lz4,
}

/// Upper bound on a decompressed payload
pub const MAX_DECOMPRESSED_SIZE: usize = 128 * 1024;

impl Compressor for CompressionMode {
    fn compress(&self, data: &[u8]) -> Bytes {
        match self {
            CompressionMode::None => Bytes::copy_from_slice(data),
            CompressionMode::Lz4 => Bytes::from(lz4_flex::block::compress(data)),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Bytes, CompressionError> {
        match self {
            CompressionMode::None => Ok(Bytes::copy_from_slice(data)),
            CompressionMode::Lz4 => {
                // No size header on the wire; output is capped instead
                let mut buf = vec![0u8; MAX_DECOMPRESSED_SIZE];
                let len = lz4_flex::block::decompress_into(data, &mut buf)
                    .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
                buf.truncate(len);
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// Calculate compression ratio
pub fn compression_ratio(original_size: usize, compressed_size: usize) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    1.0 - (compressed_size as f64 / original_size as f64)
}

/// Compression error types
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),
}
