//! Compact output encoding
//!
//! Amounts are stored with their trailing decimal zeros folded into an
//! exponent. Scripts of the standard forms are reduced to a one-byte type tag
//! plus their hash or key; anything else is stored raw behind a VLQ length that
//! is offset past the special tags.

use super::serialization::DecodeError;
use super::vlq;
use crate::script::{
    extract_compressed_pubkey, extract_pubkey_hash, extract_script_hash, pay_to_compressed_pubkey, pay_to_pubkey_hash,
    pay_to_script_hash,
};

const CST_PAY_TO_PUBKEY_HASH: u64 = 0;
const CST_PAY_TO_SCRIPT_HASH: u64 = 1;
const CST_PAY_TO_PUBKEY_COMP_EVEN: u64 = 2;
const CST_PAY_TO_PUBKEY_COMP_ODD: u64 = 3;
/// Tags 4 and 5 are reserved for uncompressed keys, which are stored raw.
const NUM_SPECIAL_SCRIPTS: u64 = 6;

/// Folds trailing zeros of `n` into an exponent.
///
/// Defined for amounts up to `MAX_AMOUNT`; larger values are rejected by
/// transaction sanity checks before they can reach storage.
pub fn compress_amount(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut e = 0u64;
    let mut n = n;
    while n % 10 == 0 && e < 9 {
        n /= 10;
        e += 1;
    }
    if e < 9 {
        let d = n % 10;
        n /= 10;
        1 + (n * 9 + d - 1) * 10 + e
    } else {
        1 + (n - 1) * 10 + 9
    }
}

pub fn decompress_amount(x: u64) -> u64 {
    if x == 0 {
        return 0;
    }
    let mut x = x - 1;
    let e = x % 10;
    x /= 10;
    let mut n = if e < 9 {
        let d = (x % 9) + 1;
        x /= 9;
        x * 10 + d
    } else {
        x + 1
    };
    for _ in 0..e {
        n *= 10;
    }
    n
}

/// Appends the compressed form of `script` to `buf`.
pub fn put_compressed_script(buf: &mut Vec<u8>, script: &[u8]) {
    if let Some(hash) = extract_pubkey_hash(script) {
        vlq::put(buf, CST_PAY_TO_PUBKEY_HASH);
        buf.extend_from_slice(&hash);
    } else if let Some(hash) = extract_script_hash(script) {
        vlq::put(buf, CST_PAY_TO_SCRIPT_HASH);
        buf.extend_from_slice(&hash);
    } else if let Some(key) = extract_compressed_pubkey(script) {
        vlq::put(buf, u64::from(key[0]));
        buf.extend_from_slice(&key[1..]);
    } else {
        vlq::put(buf, script.len() as u64 + NUM_SPECIAL_SCRIPTS);
        buf.extend_from_slice(script);
    }
}

/// Decodes a compressed script from the front of `data`.
pub fn read_compressed_script(data: &[u8]) -> Result<(Vec<u8>, usize), DecodeError> {
    let (code, offset) = vlq::read(data)?;
    let rest = &data[offset..];
    match code {
        CST_PAY_TO_PUBKEY_HASH => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(take(rest, 20)?);
            Ok((pay_to_pubkey_hash(&hash), offset + 20))
        }
        CST_PAY_TO_SCRIPT_HASH => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(take(rest, 20)?);
            Ok((pay_to_script_hash(&hash), offset + 20))
        }
        CST_PAY_TO_PUBKEY_COMP_EVEN | CST_PAY_TO_PUBKEY_COMP_ODD => {
            let mut key = [0u8; 33];
            key[0] = code as u8;
            key[1..].copy_from_slice(take(rest, 32)?);
            Ok((pay_to_compressed_pubkey(&key), offset + 32))
        }
        c if c < NUM_SPECIAL_SCRIPTS => Err(DecodeError::UnsupportedScriptType(c)),
        c => {
            let len = usize::try_from(c - NUM_SPECIAL_SCRIPTS).map_err(|_| DecodeError::Overflow)?;
            Ok((take(rest, len)?.to_vec(), offset + len))
        }
    }
}

fn take(rest: &[u8], len: usize) -> Result<&[u8], DecodeError> {
    rest.get(..len).ok_or(DecodeError::UnexpectedEnd("compressed script"))
}

/// Appends `VLQ(compressed amount) | compressed script`.
pub fn put_compressed_txout(buf: &mut Vec<u8>, value: u64, script: &[u8]) {
    vlq::put(buf, compress_amount(value));
    put_compressed_script(buf, script);
}

pub fn read_compressed_txout(data: &[u8]) -> Result<(u64, Vec<u8>, usize), DecodeError> {
    let (compressed, amount_len) = vlq::read(data)?;
    let (script, script_len) = read_compressed_script(&data[amount_len..])?;
    Ok((decompress_amount(compressed), script, amount_len + script_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_AMOUNT;
    use crate::script::null_data;

    #[test]
    fn test_amount_compression_values() {
        let cases = [(0u64, 0u64), (1, 1), (100_000_000, 9), (5_000_000_000, 50), (MAX_AMOUNT, 21_000_000)];
        for (amount, compressed) in cases {
            assert_eq!(compress_amount(amount), compressed, "amount {}", amount);
            assert_eq!(decompress_amount(compressed), amount);
        }
        for amount in [123_456_789u64, 10, 999, 1_000_000_001, MAX_AMOUNT - 1] {
            assert_eq!(decompress_amount(compress_amount(amount)), amount);
        }
    }

    #[test]
    fn test_standard_scripts_shrink() {
        let p2pkh = pay_to_pubkey_hash(&[9; 20]);
        let mut buf = Vec::new();
        put_compressed_script(&mut buf, &p2pkh);
        assert_eq!(buf.len(), 21);
        assert_eq!(buf[0], 0);
        assert_eq!(read_compressed_script(&buf).unwrap(), (p2pkh, 21));

        let mut key = [4u8; 33];
        key[0] = 0x03;
        let p2pk = pay_to_compressed_pubkey(&key);
        let mut buf = Vec::new();
        put_compressed_script(&mut buf, &p2pk);
        assert_eq!(buf.len(), 33);
        assert_eq!(read_compressed_script(&buf).unwrap(), (p2pk, 33));
    }

    #[test]
    fn test_raw_script_and_errors() {
        let raw = null_data(b"payload");
        let mut buf = Vec::new();
        put_compressed_script(&mut buf, &raw);
        assert_eq!(buf[0] as usize, raw.len() + 6);
        assert_eq!(read_compressed_script(&buf).unwrap().0, raw);
        assert!(matches!(read_compressed_script(&[4]), Err(DecodeError::UnsupportedScriptType(4))));
        assert!(matches!(read_compressed_script(&buf[..3]), Err(DecodeError::UnexpectedEnd(_))));
    }
}
