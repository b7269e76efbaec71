//! Weight characteristic payload decoding
//!
//! Scales push the weight as ASCII decimal text. Some BLE bindings hand the
//! characteristic value over base64-encoded, others as raw bytes; both end up
//! as text that is parsed with leading-integer semantics: optional leading
//! whitespace and sign, then digits, anything after the digits is ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::errors::DecodeError;
use crate::types::Grams;

// ----------------------------------------------------------------------------
// Payload
// ----------------------------------------------------------------------------

/// A characteristic value as delivered by the central
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Base64 text, as produced by bindings that cannot pass raw bytes
    Base64(String),
    /// Raw characteristic bytes
    Bytes(Vec<u8>),
}

impl Payload {
    /// Whether the payload carries no data at all
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Base64(text) => text.is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Turn a payload into the raw characteristic bytes
pub fn decode_payload(payload: &Payload) -> Result<Vec<u8>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    match payload {
        Payload::Base64(text) => STANDARD
            .decode(text.trim())
            .map_err(|e| DecodeError::InvalidBase64(e.to_string())),
        Payload::Bytes(bytes) => Ok(bytes.clone()),
    }
}

/// Parse the leading base-10 integer of a characteristic value
pub fn parse_grams(bytes: &[u8]) -> Result<Grams, DecodeError> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_start();

    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return Err(DecodeError::NotANumber(text.to_string()));
    }

    let digits = &rest[..digits_len];
    let magnitude: i64 = digits
        .parse()
        .map_err(|_| DecodeError::OutOfRange(text.to_string()))?;

    Ok(Grams::new(if negative { -magnitude } else { magnitude }))
}

/// Decode a notification payload into a weight
pub fn decode_weight(payload: &Payload) -> Result<Grams, DecodeError> {
    let bytes = decode_payload(payload)?;
    parse_grams(&bytes)
}
