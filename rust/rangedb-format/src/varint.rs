//! Unsigned LEB128 varints.

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Appends the varint encoding of `value` to `buf` and returns the number of bytes written.
pub fn encode_uvarint(buf: &mut Vec<u8>, mut value: u64) -> usize {
    let start = buf.len();
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
    buf.len() - start
}

/// Decodes a varint from the start of `buf`.
///
/// Returns the value and the number of bytes read. A read count of `0` means the
/// buffer ended before the varint did; a negative count `-n` means the value overflows
/// 64 bits and the varint was rejected after `n` bytes.
pub fn decode_uvarint(buf: &[u8]) -> (u64, isize) {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return (0, -(i as isize + 1));
        }
        if b < 0x80 {
            if i == MAX_VARINT_LEN - 1 && b > 1 {
                return (0, -(i as isize + 1));
            }
            return (value | (b as u64) << shift, i as isize + 1);
        }
        value |= ((b & 0x7f) as u64) << shift;
        shift += 7;
    }
    (0, 0)
}

#[cfg(test)]
mod tests {
    use super::{MAX_VARINT_LEN, decode_uvarint, encode_uvarint};

    #[test]
    fn test_round_trip() {
        let mut rng = fastrand::Rng::with_seed(17);
        let mut values = vec![0, 1, 127, 128, 300, 16_383, 16_384, u64::MAX >> 1, u64::MAX];
        values.extend((0..200).map(|_| rng.u64(..(1 << 63))));
        for value in values {
            let mut buf = Vec::new();
            let written = encode_uvarint(&mut buf, value);
            assert!(written <= MAX_VARINT_LEN);
            assert_eq!(decode_uvarint(&buf), (value, written as isize));
        }
    }

    #[test]
    fn test_known_encoding() {
        let mut buf = Vec::new();
        encode_uvarint(&mut buf, 300);
        assert_eq!(buf, [0xac, 0x02]);
    }

    #[test]
    fn test_truncated_and_overflow() {
        assert_eq!(decode_uvarint(&[]), (0, 0));
        assert_eq!(decode_uvarint(&[0x80, 0x80]), (0, 0));

        let mut overflow = vec![0xff; MAX_VARINT_LEN - 1];
        overflow.push(0x02);
        let (_, read) = decode_uvarint(&overflow);
        assert!(read < 0);

        let too_long = vec![0x80; MAX_VARINT_LEN + 1];
        let (_, read) = decode_uvarint(&too_long);
        assert!(read < 0);
    }
}
