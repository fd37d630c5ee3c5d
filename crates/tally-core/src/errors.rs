//! Error types for foundation operations

/// Failure to parse a textual identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The text is not valid hexadecimal
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded value has the wrong number of bytes
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required byte length
        expected: usize,
        /// Decoded byte length
        actual: usize,
    },
}

impl From<hex::FromHexError> for ParseError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex(err.to_string())
    }
}

/// Standard Result type for parsing identifiers
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Decode exactly 32 bytes of lowercase or uppercase hex.
pub(crate) fn decode_hex32(text: &str) -> ParseResult<[u8; 32]> {
    let bytes = hex::decode(text)?;
    if bytes.len() != 32 {
        return Err(ParseError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
