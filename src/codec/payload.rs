use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::compression::{CompressionMode, Compressor};
use super::error::{CodecError, Result};

/// Literal prefix carried by every encoded transaction payload
pub const PROTOCOL_HEADER: &str = "ELINK::";

const HEX_PREFIX: &str = "0x";

/// Whether decoded transactions carry the `0x` marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexPrefix {
    /// Always emit `0x` (ledger RPC expects it)
    #[default]
    Required,
    /// Emit the bare hex digits
    Bare,
}

/// A transport-safe transaction payload (`ELINK::<base64>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in characters, which is what the SMS budget counts
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn has_header(&self) -> bool {
        self.0.starts_with(PROTOCOL_HEADER)
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EncodedPayload {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Encodes signed transaction hex into `ELINK::` payloads and back
#[derive(Clone)]
pub struct TxCodec {
    compressor: Arc<dyn Compressor>,
    hex_prefix: HexPrefix,
}

impl Default for TxCodec {
    fn default() -> Self {
        Self::new(CompressionMode::Lz4, HexPrefix::Required)
    }
}

impl fmt::Debug for TxCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxCodec")
            .field("hex_prefix", &self.hex_prefix)
            .finish_non_exhaustive()
    }
}

impl TxCodec {
    pub fn new(compressor: impl Compressor + 'static, hex_prefix: HexPrefix) -> Self {
        Self {
            compressor: Arc::new(compressor),
            hex_prefix,
        }
    }

    pub fn hex_prefix(&self) -> HexPrefix {
        self.hex_prefix
    }

    /// Encode a transaction hex string, with or without `0x`
    ///
    /// The digits are compressed as raw bytes, not as ASCII text.
    pub fn encode(&self, tx_hex: &str) -> Result<EncodedPayload> {
        let digits = strip_hex_prefix(tx_hex);
        validate_hex_digits(digits)?;
        let raw = tx_bytes(digits)?;

        let compressed = self.compressor.compress(&raw);
        let body = STANDARD_NO_PAD.encode(&compressed);

        Ok(EncodedPayload(format!("{PROTOCOL_HEADER}{body}")))
    }

    /// Decode an `ELINK::` payload back to transaction hex
    pub fn decode(&self, payload: &str) -> Result<String> {
        let body = payload.strip_prefix(PROTOCOL_HEADER).ok_or_else(|| {
            CodecError::InvalidFormat(format!("missing {PROTOCOL_HEADER} header"))
        })?;

        // Padding is optional on the wire
        let compressed = STANDARD_NO_PAD
            .decode(body.trim_end_matches('='))
            .map_err(|e| CodecError::InvalidFormat(format!("invalid base64: {e}")))?;

        let raw = self
            .compressor
            .decompress(&compressed)
            .map_err(|e| CodecError::InvalidFormat(e.to_string()))?;
        if raw.is_empty() {
            return Err(CodecError::InvalidFormat("empty transaction".into()));
        }

        let digits = hex::encode(&raw);
        Ok(match self.hex_prefix {
            HexPrefix::Required => format!("{HEX_PREFIX}{digits}"),
            HexPrefix::Bare => digits.to_string(),
        })
    }

    /// Decode a payload straight to raw transaction bytes
    pub fn decode_bytes(&self, payload: &str) -> Result<Vec<u8>> {
        let tx_hex = self.decode(payload)?;
        tx_bytes(&tx_hex)
    }
}

/// Convert transaction hex (with or without `0x`) into raw bytes
pub fn tx_bytes(tx_hex: &str) -> Result<Vec<u8>> {
    hex::decode(strip_hex_prefix(tx_hex))
        .map_err(|e| CodecError::InvalidFormat(format!("transaction hex: {e}")))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn validate_hex_digits(digits: &str) -> Result<()> {
    if digits.is_empty() {
        return Err(CodecError::InvalidFormat("empty transaction".into()));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidFormat(
            "transaction contains non-hex characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    const SIGNED_TX: &str = "0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";

    #[test]
    fn test_bare_roundtrip_deadbeef() {
        let codec = TxCodec::new(CompressionMode::Lz4, HexPrefix::Bare);

        let encoded = codec.encode("deadbeef").unwrap();
        assert!(encoded.has_header());
        assert_eq!(codec.decode(encoded.as_str()).unwrap(), "deadbeef");
    }

    #[test]
    fn test_required_prefix_roundtrip() {
        let codec = TxCodec::default();

        let encoded = codec.encode("0xdeadbeef").unwrap();
        assert_eq!(codec.decode(encoded.as_str()).unwrap(), "0xdeadbeef");

        let encoded = codec.encode(SIGNED_TX).unwrap();
        assert_eq!(codec.decode(encoded.as_str()).unwrap(), SIGNED_TX);
    }

    #[test]
    fn test_required_prefix_is_restored() {
        let codec = TxCodec::default();
        let encoded = codec.encode("deadbeef").unwrap();
        assert_eq!(codec.decode(encoded.as_str()).unwrap(), "0xdeadbeef");
    }

    #[test]
    fn test_signed_transfer_shrinks() {
        let codec = TxCodec::default();
        let encoded = codec.encode(SIGNED_TX).unwrap();

        let hex_len = SIGNED_TX.len() - 2;
        assert_eq!(hex_len, 220);
        assert!(
            encoded.char_len() < hex_len,
            "{} chars encoded from {} hex digits",
            encoded.char_len(),
            hex_len
        );
    }

    #[test]
    fn test_encoded_body_is_unpadded_base64_of_bytes() {
        let codec = TxCodec::new(CompressionMode::None, HexPrefix::Bare);
        let encoded = codec.encode("0xabcd").unwrap();
        assert_eq!(encoded.as_str(), format!("{PROTOCOL_HEADER}q80"));
    }

    #[test]
    fn test_decode_accepts_padded_base64() {
        let codec = TxCodec::new(CompressionMode::None, HexPrefix::Required);
        let payload = format!("{PROTOCOL_HEADER}{}", STANDARD.encode([0xab, 0xcd]));
        assert!(payload.ends_with('='));
        assert_eq!(codec.decode(&payload).unwrap(), "0xabcd");
    }

    #[test]
    fn test_decode_emits_lowercase() {
        let codec = TxCodec::default();
        let encoded = codec.encode("0xDEADBEEF").unwrap();
        assert_eq!(codec.decode(encoded.as_str()).unwrap(), "0xdeadbeef");
    }

    #[test]
    fn test_decode_missing_header() {
        let codec = TxCodec::default();
        let err = codec.decode("HELLO::abcd").unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }

    #[test]
    fn test_decode_invalid_base64() {
        let codec = TxCodec::default();
        assert!(codec.decode("ELINK::not base64!").is_err());
    }

    #[test]
    fn test_decode_empty_output() {
        let codec = TxCodec::new(CompressionMode::None, HexPrefix::Required);
        assert!(codec.decode(PROTOCOL_HEADER).is_err());
    }

    #[test]
    fn test_decode_corrupt_block() {
        let codec = TxCodec::default();
        let payload = format!("{PROTOCOL_HEADER}{}", STANDARD_NO_PAD.encode([0x50, 0x61]));
        assert!(codec.decode(&payload).is_err());
    }

    #[test]
    fn test_encode_rejects_non_hex() {
        let codec = TxCodec::default();
        assert!(codec.encode("0xnothex").is_err());
        assert!(codec.encode("0x").is_err());
        assert!(codec.encode("").is_err());
    }

    #[test]
    fn test_encode_rejects_odd_length() {
        let codec = TxCodec::default();
        assert!(codec.encode("0xabc").is_err());
    }

    #[test]
    fn test_decode_bytes() {
        let codec = TxCodec::default();
        let encoded = codec.encode("0xdeadbeef").unwrap();
        assert_eq!(
            codec.decode_bytes(encoded.as_str()).unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn test_tx_bytes_rejects_odd_length() {
        assert!(tx_bytes("0xabc").is_err());
    }
}
