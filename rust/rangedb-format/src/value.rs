//! Key encodings of indexed values.
//!
//! Every encoding preserves the natural order of the values under byte-lexicographic
//! comparison, so range predicates translate directly into key bounds.

use rangedb_common::{Result, error::Error};

/// Encodes a float as 8 big-endian bytes whose unsigned order matches numeric order.
pub fn encode_f64(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    };
    ordered.to_be_bytes()
}

pub fn decode_f64(buf: &[u8]) -> Result<f64> {
    let bytes: [u8; 8] = buf
        .try_into()
        .map_err(|_| Error::malformed_node(format!("float64 key of {} bytes", buf.len())))?;
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered >> 63 == 1 {
        ordered & !(1 << 63)
    } else {
        !ordered
    };
    Ok(f64::from_bits(bits))
}

pub fn encode_bool(value: bool) -> [u8; 1] {
    [value as u8]
}

pub fn decode_bool(buf: &[u8]) -> Result<bool> {
    match buf {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(Error::malformed_node("invalid boolean key")),
    }
}
