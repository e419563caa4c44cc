//! Variable-length quantities
//!
//! MSB base-128 encoding where every continuation byte also subtracts one
//! before shifting. This removes redundant encodings, so each value has exactly
//! one representation and `0x7f` and `0x80` take one and two bytes.

use super::serialization::DecodeError;

/// Number of bytes `n` occupies once encoded.
pub fn serialize_size(mut n: u64) -> usize {
    let mut size = 1;
    while n > 0x7f {
        size += 1;
        n = (n >> 7) - 1;
    }
    size
}

/// Appends the encoding of `n` to `buf`.
pub fn put(buf: &mut Vec<u8>, mut n: u64) {
    let start = buf.len();
    let mut first = true;
    loop {
        let high_bit = if first { 0 } else { 0x80 };
        buf.push((n & 0x7f) as u8 | high_bit);
        if n <= 0x7f {
            break;
        }
        n = (n >> 7) - 1;
        first = false;
    }
    buf[start..].reverse();
}

/// Decodes a value from the front of `data`, returning it together with the
/// number of bytes consumed.
pub fn read(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut n: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if n > (u64::MAX >> 7) {
            return Err(DecodeError::Overflow);
        }
        n = (n << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 != 0 {
            n = n.checked_add(1).ok_or(DecodeError::Overflow)?;
        } else {
            return Ok((n, i + 1));
        }
    }
    Err(DecodeError::UnexpectedEnd("vlq"))
}
