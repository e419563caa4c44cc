//! Difficulty arithmetic
//!
//! This module converts between the compact "bits" encoding of a proof-of-work
//! target and its full 256-bit value, and provides the wide-integer helpers the
//! difficulty managers use so that no consensus value passes through floating
//! point or platform-dependent rounding.

pub use primitive_types::{U256, U512};

/// Converts compact bits to a target.
///
/// The compact form is a base-256 float: the high byte is the length in bytes,
/// the low 23 bits are the mantissa and bit 23 is a sign bit. Negative and
/// overflowing encodings yield zero, which callers treat as invalid.
pub fn compact_to_target(bits: u32) -> U256 {
    let size = (bits >> 24) as usize;
    let mantissa = bits & 0x007f_ffff;
    let negative = bits & 0x0080_0000 != 0;
    if negative && mantissa != 0 {
        return U256::zero();
    }
    if size <= 3 {
        return U256::from(mantissa >> (8 * (3 - size)));
    }
    let shift = 8 * (size - 3);
    if shift >= 256 || (mantissa != 0 && (U256::from(mantissa).leading_zeros() as usize) < shift) {
        return U256::zero();
    }
    U256::from(mantissa) << shift
}

/// Converts a target to compact bits, normalising the mantissa so that the
/// sign bit is never set.
pub fn target_to_compact(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut size = (target.bits() + 7) / 8;
    let mut mantissa: u32 = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3))).low_u32()
    };
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        size += 1;
    }
    ((size as u32) << 24) | mantissa
}

/// Expected number of hashes needed to find a block at `bits`:
/// `2^256 / (target + 1)`.
pub fn calc_work(bits: u32) -> U256 {
    let target = compact_to_target(bits);
    if target.is_zero() {
        return U256::zero();
    }
    // (~target / (target + 1)) + 1 avoids representing 2^256
    (!target / (target + U256::one())) + U256::one()
}

/// Widens a target for intermediate products.
pub fn widen(value: U256) -> U512 {
    U512::from(value)
}

/// Narrows an intermediate product back to 256 bits, saturating at the maximum.
pub fn narrow_saturating(value: U512) -> U256 {
    U256::try_from(value).unwrap_or(U256::MAX)
}
