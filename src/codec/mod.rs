//! Transaction payload codec
//!
//! Turns a signed transaction hex string into an SMS-safe `ELINK::` payload
//! and back.

pub mod compression;
pub mod error;
pub mod payload;

pub use compression::{compression_ratio, CompressionError, CompressionMode, Compressor};
pub use error::{CodecError, Result};
pub use payload::{EncodedPayload, HexPrefix, TxCodec, PROTOCOL_HEADER};
